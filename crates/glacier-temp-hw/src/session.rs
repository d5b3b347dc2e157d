//! Pump device sessions over USB HID.
//!
//! Each configured model gets an independent slot with its own session
//! lifecycle: closed until a matching device enumerates, open while writes
//! succeed, closed again on the first failure. A failed write earns exactly
//! one reconnect attempt inside the same broadcast; after that the slot
//! waits for the next one.

use hidapi::{HidApi, HidDevice};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::report::{build_temperature_report, PumpModel, REPORT_SIZE};

/// Write half of an open pump device.
///
/// Implemented by [`HidDevice`]; tests substitute scripted ports so the
/// failure policy can be exercised without hardware.
pub trait ReportPort {
    fn write_report(&self, report: &[u8; REPORT_SIZE]) -> Result<()>;
}

impl ReportPort for HidDevice {
    fn write_report(&self, report: &[u8; REPORT_SIZE]) -> Result<()> {
        let written = self.write(report)?;
        if written < REPORT_SIZE {
            return Err(Error::ShortWrite {
                written,
                expected: REPORT_SIZE,
            });
        }
        Ok(())
    }
}

/// Opens sessions for pump models.
pub trait Connect {
    type Port: ReportPort;

    fn connect(&mut self, model: &PumpModel) -> Result<Self::Port>;
}

/// Production connector backed by [`HidApi`].
pub struct HidConnector {
    api: HidApi,
}

impl HidConnector {
    pub fn new() -> Result<Self> {
        Ok(Self {
            api: HidApi::new()?,
        })
    }
}

impl Connect for HidConnector {
    type Port = HidDevice;

    /// Re-enumerates and opens the first device matching the model's
    /// VID:PID exclusively.
    fn connect(&mut self, model: &PumpModel) -> Result<HidDevice> {
        self.api.refresh_devices()?;

        let info = self
            .api
            .device_list()
            .find(|d| d.vendor_id() == model.vendor_id && d.product_id() == model.product_id)
            .ok_or(Error::DeviceNotFound {
                vendor_id: model.vendor_id,
                product_id: model.product_id,
            })?;

        debug!(
            "found {} at {:?} (interface {})",
            model.name,
            info.path(),
            info.interface_number()
        );

        info.open_device(&self.api).map_err(|e| Error::DeviceOpenFailed {
            model: model.name,
            source: e,
        })
    }
}

/// One configured pump and its session state.
struct DeviceSlot<P> {
    model: &'static PumpModel,
    port: Option<P>,
    outage_logged: bool,
}

/// Independent sessions for every configured pump model.
pub struct DeviceSet<C: Connect> {
    connector: C,
    slots: Vec<DeviceSlot<C::Port>>,
}

impl<C: Connect> DeviceSet<C> {
    pub fn new(connector: C, models: Vec<&'static PumpModel>) -> Self {
        Self {
            connector,
            slots: models
                .into_iter()
                .map(|model| DeviceSlot {
                    model,
                    port: None,
                    outage_logged: false,
                })
                .collect(),
        }
    }

    /// Number of currently open sessions.
    pub fn connected(&self) -> usize {
        self.slots.iter().filter(|s| s.port.is_some()).count()
    }

    /// Number of configured slots.
    pub fn total(&self) -> usize {
        self.slots.len()
    }

    /// Broadcasts the temperature to every slot.
    ///
    /// A closed slot gets one connect attempt (deferred re-enumeration). An
    /// open slot whose write fails is closed, reconnected at most once, and
    /// given one retried write; any further failure waits for the next call.
    /// Never returns an error; device trouble is logged and retried later.
    pub fn send_temperature(&mut self, temp_c: f32) {
        for slot in &mut self.slots {
            Self::service_slot(&mut self.connector, slot, temp_c);
        }
    }

    fn service_slot(connector: &mut C, slot: &mut DeviceSlot<C::Port>, temp_c: f32) {
        if slot.port.is_none() && !Self::try_connect(connector, slot) {
            return;
        }

        if Self::try_write(slot, temp_c) {
            return;
        }

        // The single in-tick reconnect after a write failure.
        if Self::try_connect(connector, slot) {
            Self::try_write(slot, temp_c);
        }
    }

    fn try_connect(connector: &mut C, slot: &mut DeviceSlot<C::Port>) -> bool {
        match connector.connect(slot.model) {
            Ok(port) => {
                slot.port = Some(port);
                if slot.outage_logged {
                    info!("{} reconnected", slot.model.name);
                } else {
                    info!("{} connected", slot.model.name);
                }
                slot.outage_logged = false;
                true
            }
            Err(Error::DeviceNotFound { .. }) if slot.outage_logged => false,
            Err(e) => {
                slot.outage_logged = true;
                warn!("{}: {e}", slot.model.name);
                false
            }
        }
    }

    fn try_write(slot: &mut DeviceSlot<C::Port>, temp_c: f32) -> bool {
        let Some(port) = slot.port.as_ref() else {
            return false;
        };
        let report = build_temperature_report(slot.model, temp_c);
        match port.write_report(&report) {
            Ok(()) => true,
            Err(e) => {
                warn!("{}: write failed, closing session: {e}", slot.model.name);
                slot.port = None;
                false
            }
        }
    }

    /// Drops every open session.
    pub fn close_all(&mut self) {
        for slot in &mut self.slots {
            if slot.port.take().is_some() {
                info!("{} session closed", slot.model.name);
            }
        }
    }
}
