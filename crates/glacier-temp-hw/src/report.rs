//! Pump report protocol definitions and encoding.
//!
//! The wire format is a single 10-byte output report reproduced from a USB
//! capture of the vendor application. Only offset 1 carries meaning we
//! understand (the temperature); every other byte is replayed verbatim from
//! the capture, per model.

/// Total report size in bytes, including the leading report id byte.
pub const REPORT_SIZE: usize = 10;

/// Byte offset of the temperature value inside the report.
pub const TEMPERATURE_OFFSET: usize = 1;

/// A supported pump model: USB identifiers plus its captured report frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpModel {
    pub name: &'static str,
    pub vendor_id: u16,
    pub product_id: u16,
    /// Baseline report bytes from the vendor-application capture. Offset 1
    /// is overwritten with the live temperature before sending.
    pub frame: [u8; REPORT_SIZE],
}

/// Husky Glacier HWT700PT.
///
/// A second capture session yielded an all-zero frame with only offset 1
/// populated; the frame below is the one the vendor application was last
/// verified against. Re-capture before trusting these bytes on new firmware.
pub const HWT700PT: PumpModel = PumpModel {
    name: "HWT700PT",
    vendor_id: 0xAA88,
    product_id: 0x8666,
    frame: [0x00, 0x32, 0x00, 0x00, 0x24, 0x11, 0x00, 0x00, 0x00, 0x00],
};

/// All models known to speak this report format. Other Glacier-family
/// pumps are new rows here, not new code.
pub const MODELS: &[PumpModel] = &[HWT700PT];

/// Looks up a model by name, case-insensitively.
pub fn find_model(name: &str) -> Option<&'static PumpModel> {
    MODELS.iter().find(|m| m.name.eq_ignore_ascii_case(name))
}

/// Encodes a temperature as its wire byte: rounded, clamped to 0-255.
pub fn encode_temperature(temp_c: f32) -> u8 {
    temp_c.round().clamp(0.0, 255.0) as u8
}

/// Builds the temperature report for a model.
pub fn build_temperature_report(model: &PumpModel, temp_c: f32) -> [u8; REPORT_SIZE] {
    let mut report = model.frame;
    report[TEMPERATURE_OFFSET] = encode_temperature(temp_c);
    report
}
