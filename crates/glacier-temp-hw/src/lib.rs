//! Glacier Pump Hardware Library
//!
//! Session management and report encoding for Husky Glacier liquid-cooler
//! pumps whose onboard display mirrors a host-supplied temperature.

pub mod error;
pub mod report;
pub mod session;

pub use error::{Error, Result};
pub use report::{PumpModel, HWT700PT, MODELS, REPORT_SIZE};
pub use session::{Connect, DeviceSet, HidConnector, ReportPort};
