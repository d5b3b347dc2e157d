//! The fixed-period tick pipeline: sample, render on delta, broadcast.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use glacier_temp_hw::{Connect, DeviceSet};

use crate::icon::{DisplayValue, IconState, RenderedIcon};
use crate::sampler::Sample;

/// Receives icon and tooltip updates produced by a tick.
pub trait Surface {
    fn set_icon(&mut self, icon: RenderedIcon);
    fn set_status(&mut self, status: &str);
}

/// Single-slot non-reentrant lock. A tick attempt while one is running is
/// skipped, never queued.
pub struct TickGuard {
    busy: AtomicBool,
}

impl TickGuard {
    pub const fn new() -> Self {
        Self {
            busy: AtomicBool::new(false),
        }
    }

    pub fn try_enter(&self) -> Option<TickPermit<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Acquire)
            .ok()
            .map(|_| TickPermit { guard: self })
    }
}

pub struct TickPermit<'a> {
    guard: &'a TickGuard,
}

impl Drop for TickPermit<'_> {
    fn drop(&mut self) {
        self.guard.busy.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Completed,
    Skipped,
}

/// Collapses repeated sampling failures into one log line per minute.
struct ErrorThrottle {
    consecutive: u32,
    last_log: Instant,
}

impl ErrorThrottle {
    fn new() -> Self {
        Self {
            consecutive: 0,
            last_log: Instant::now(),
        }
    }

    fn failed(&mut self, err: &dyn std::fmt::Display) {
        self.consecutive += 1;
        let elapsed = self.last_log.elapsed();
        if self.consecutive == 1 || elapsed >= Duration::from_secs(60) {
            if self.consecutive > 1 {
                warn!(
                    "sampling error (repeated {} times in {:?}): {}",
                    self.consecutive, elapsed, err
                );
            } else {
                warn!("sampling error: {}", err);
            }
            self.last_log = Instant::now();
            self.consecutive = 0;
        }
    }

    fn reset(&mut self) {
        self.consecutive = 0;
    }
}

/// All mutable loop state, owned by the scheduler and threaded through the
/// tick stages.
pub struct TickContext<S: Sample, C: Connect> {
    sampler: S,
    icon: IconState,
    devices: Option<DeviceSet<C>>,
    guard: TickGuard,
    last_temp: Option<f32>,
    sensor_failing: bool,
    sensor_unavailable: bool,
    throttle: ErrorThrottle,
    last_status: String,
}

impl<S: Sample, C: Connect> TickContext<S, C> {
    /// `devices` is `None` in display-only mode.
    pub fn new(sampler: S, devices: Option<DeviceSet<C>>) -> Self {
        Self {
            sampler,
            icon: IconState::new(),
            devices,
            guard: TickGuard::new(),
            last_temp: None,
            sensor_failing: false,
            sensor_unavailable: false,
            throttle: ErrorThrottle::new(),
            last_status: String::new(),
        }
    }

    /// Runs one full pipeline pass. Stage errors never escape: sampling
    /// trouble keeps the last good reading, device trouble is handled by
    /// the session set. A pass that overlaps a running one is skipped.
    pub fn run_tick(&mut self, surface: &mut impl Surface) -> TickOutcome {
        let Some(_permit) = self.guard.try_enter() else {
            debug!("previous tick still running, skipping");
            return TickOutcome::Skipped;
        };

        match self.sampler.sample() {
            Ok(Some(temp)) => {
                if self.sensor_failing {
                    info!("sensor recovered ({temp:.1} C)");
                }
                self.last_temp = Some(temp);
                self.sensor_failing = false;
                self.sensor_unavailable = false;
                self.throttle.reset();
            }
            Ok(None) => {
                if !self.sensor_unavailable {
                    warn!("no usable CPU temperature reading, keeping last value");
                }
                self.sensor_unavailable = true;
                self.sensor_failing = false;
                self.throttle.reset();
            }
            Err(e) => {
                self.sensor_failing = true;
                self.throttle.failed(&e);
            }
        }

        let value = self.display_value();
        if let Some(icon) = self.icon.update(value) {
            surface.set_icon(icon);
        }

        // The pump keeps mirroring the last good reading through sensor
        // outages; it only goes silent if nothing was ever read.
        if let (Some(devices), Some(temp)) = (self.devices.as_mut(), self.last_temp) {
            devices.send_temperature(temp);
        }

        let status = self.status_line();
        if status != self.last_status {
            surface.set_status(&status);
            self.last_status = status;
        }

        TickOutcome::Completed
    }

    fn display_value(&self) -> DisplayValue {
        if self.sensor_failing {
            DisplayValue::Error
        } else {
            match self.last_temp {
                Some(t) => DisplayValue::Temperature(t),
                None => DisplayValue::Unavailable,
            }
        }
    }

    fn status_line(&self) -> String {
        let sensor = if self.sensor_failing {
            "sensor error".to_string()
        } else {
            match self.last_temp {
                Some(t) if self.sensor_unavailable => {
                    format!("CPU {:.0} C (sensor unavailable)", t)
                }
                Some(t) => format!("CPU {:.0} C", t),
                None => "no CPU sensor".to_string(),
            }
        };

        match &self.devices {
            Some(d) => format!("{sensor}, pump {}/{}", d.connected(), d.total()),
            None => sensor,
        }
    }

    /// Ordered shutdown: sessions first, then the cached icon resource.
    pub fn shutdown(&mut self) {
        if let Some(devices) = self.devices.as_mut() {
            devices.close_all();
        }
        self.icon.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::SensorReadError;
    use glacier_temp_hw::error::{Error as HwError, Result as HwResult};
    use glacier_temp_hw::report::{PumpModel, HWT700PT, REPORT_SIZE};
    use glacier_temp_hw::ReportPort;
    use std::cell::Cell;
    use std::io;
    use std::rc::Rc;

    enum Step {
        Temp(f32),
        Missing,
        Fail,
    }

    struct StubSampler {
        script: Vec<Step>,
        index: usize,
    }

    impl StubSampler {
        fn new(script: Vec<Step>) -> Self {
            Self { script, index: 0 }
        }
    }

    impl Sample for StubSampler {
        fn sample(&mut self) -> Result<Option<f32>, SensorReadError> {
            let step = self
                .script
                .get(self.index)
                .unwrap_or_else(|| self.script.last().unwrap());
            self.index += 1;
            match step {
                Step::Temp(t) => Ok(Some(*t)),
                Step::Missing => Ok(None),
                Step::Fail => Err(SensorReadError::Read {
                    path: "/sys/class/hwmon/hwmon0/temp1_input".into(),
                    source: io::Error::new(io::ErrorKind::NotFound, "gone"),
                }),
            }
        }
    }

    #[derive(Default)]
    struct RecordingSurface {
        icons: Vec<RenderedIcon>,
        statuses: Vec<String>,
    }

    impl Surface for RecordingSurface {
        fn set_icon(&mut self, icon: RenderedIcon) {
            self.icons.push(icon);
        }

        fn set_status(&mut self, status: &str) {
            self.statuses.push(status.to_string());
        }
    }

    struct FlakyPort {
        fail_writes: Rc<Cell<bool>>,
        writes: Rc<Cell<u32>>,
    }

    impl ReportPort for FlakyPort {
        fn write_report(&self, _report: &[u8; REPORT_SIZE]) -> HwResult<()> {
            self.writes.set(self.writes.get() + 1);
            if self.fail_writes.get() {
                Err(HwError::ShortWrite {
                    written: 0,
                    expected: REPORT_SIZE,
                })
            } else {
                Ok(())
            }
        }
    }

    struct FlakyConnector {
        fail_writes: Rc<Cell<bool>>,
        connects: Rc<Cell<u32>>,
        writes: Rc<Cell<u32>>,
    }

    impl Connect for FlakyConnector {
        type Port = FlakyPort;

        fn connect(&mut self, _model: &PumpModel) -> HwResult<FlakyPort> {
            self.connects.set(self.connects.get() + 1);
            Ok(FlakyPort {
                fail_writes: self.fail_writes.clone(),
                writes: self.writes.clone(),
            })
        }
    }

    fn display_only_ctx(script: Vec<Step>) -> TickContext<StubSampler, FlakyConnector> {
        TickContext::new(StubSampler::new(script), None)
    }

    #[test]
    fn test_tick_attempt_while_held_is_noop() {
        let mut ctx = display_only_ctx(vec![Step::Temp(50.0)]);
        let mut surface = RecordingSurface::default();

        let permit = ctx.guard.try_enter();
        assert!(permit.is_some());
        assert_eq!(ctx.run_tick(&mut surface), TickOutcome::Skipped);
        assert!(surface.icons.is_empty());

        drop(permit);
        assert_eq!(ctx.run_tick(&mut surface), TickOutcome::Completed);
        assert_eq!(surface.icons.len(), 1);
    }

    #[test]
    fn test_device_write_failure_never_escapes() {
        let fail_writes = Rc::new(Cell::new(true));
        let connects = Rc::new(Cell::new(0));
        let writes = Rc::new(Cell::new(0));
        let connector = FlakyConnector {
            fail_writes: fail_writes.clone(),
            connects: connects.clone(),
            writes: writes.clone(),
        };
        let devices = DeviceSet::new(connector, vec![&HWT700PT]);
        let mut ctx = TickContext::new(StubSampler::new(vec![Step::Temp(50.0)]), Some(devices));
        let mut surface = RecordingSurface::default();

        assert_eq!(ctx.run_tick(&mut surface), TickOutcome::Completed);
        // Open, failed write, one reconnect, one failed retry.
        assert_eq!(connects.get(), 2);
        assert_eq!(writes.get(), 2);

        // Later ticks keep retrying without ever panicking or aborting.
        fail_writes.set(false);
        assert_eq!(ctx.run_tick(&mut surface), TickOutcome::Completed);
        assert_eq!(connects.get(), 3);
        assert_eq!(writes.get(), 3);
    }

    #[test]
    fn test_sampling_failure_shows_error_and_reverts() {
        let mut ctx = display_only_ctx(vec![Step::Temp(50.0), Step::Fail, Step::Temp(50.2)]);
        let mut surface = RecordingSurface::default();

        ctx.run_tick(&mut surface);
        ctx.run_tick(&mut surface);
        ctx.run_tick(&mut surface);

        // Temperature, error glyph, reverted temperature.
        assert_eq!(surface.icons.len(), 3);
        assert!(surface.statuses.iter().any(|s| s.contains("sensor error")));
        assert!(surface
            .statuses
            .last()
            .is_some_and(|s| s.contains("CPU 50 C")));
    }

    #[test]
    fn test_failure_retains_last_reading() {
        let mut ctx = display_only_ctx(vec![Step::Temp(50.0), Step::Fail]);
        let mut surface = RecordingSurface::default();

        ctx.run_tick(&mut surface);
        ctx.run_tick(&mut surface);

        assert_eq!(ctx.last_temp, Some(50.0));
        assert!(ctx.sensor_failing);
    }

    #[test]
    fn test_unavailable_before_first_reading() {
        let mut ctx = display_only_ctx(vec![Step::Missing]);
        let mut surface = RecordingSurface::default();

        ctx.run_tick(&mut surface);
        ctx.run_tick(&mut surface);

        // The placeholder icon renders once, not per tick.
        assert_eq!(surface.icons.len(), 1);
        assert!(surface.statuses.iter().any(|s| s.contains("no CPU sensor")));
    }

    #[test]
    fn test_delta_rule_across_ticks() {
        let mut ctx = display_only_ctx(vec![
            Step::Temp(50.0),
            Step::Temp(50.4),
            Step::Temp(50.9),
            Step::Temp(52.0),
        ]);
        let mut surface = RecordingSurface::default();

        for _ in 0..4 {
            ctx.run_tick(&mut surface);
        }
        assert_eq!(surface.icons.len(), 2);
    }

    #[test]
    fn test_shutdown_releases_icon() {
        let mut ctx = display_only_ctx(vec![Step::Temp(50.0)]);
        let mut surface = RecordingSurface::default();

        ctx.run_tick(&mut surface);
        assert!(ctx.icon.current().is_some());

        ctx.shutdown();
        assert!(ctx.icon.current().is_none());
    }
}
