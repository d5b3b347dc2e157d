//! Error types for the Glacier pump hardware library.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when interacting with the hardware.
#[derive(Error, Debug)]
pub enum Error {
    /// No USB device with the model's identifiers is present.
    #[error("pump not found (VID:PID {vendor_id:04X}:{product_id:04X})")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },

    /// A matching device was found but could not be opened exclusively.
    #[error("failed to open {model}")]
    DeviceOpenFailed {
        model: &'static str,
        #[source]
        source: hidapi::HidError,
    },

    /// USB HID communication error.
    #[error("USB HID error: {0}")]
    Hid(#[from] hidapi::HidError),

    /// The device accepted fewer bytes than a full report.
    #[error("short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },
}
