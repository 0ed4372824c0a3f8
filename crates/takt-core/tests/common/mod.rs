//! Shared doubles for the integration tests: fake clock, hand-fired alarms,
//! a recording pulse output and a scripted power host.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use takt_core::{Clock, DebounceAlarm, Error, PowerHost, PulseOutput};

#[derive(Clone, Default)]
pub struct FakeClock(Arc<AtomicU64>);

impl FakeClock {
    pub fn advance(&self, us: u64) {
        self.0.fetch_add(us, Ordering::SeqCst);
    }
}

impl Clock for FakeClock {
    fn now_us(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Records restart/cancel calls; the test fires the expiry entry points by
/// hand.
#[derive(Clone, Default)]
pub struct ManualAlarm {
    inner: Arc<ManualAlarmInner>,
}

#[derive(Default)]
struct ManualAlarmInner {
    restarts: AtomicUsize,
    pending: Mutex<Option<Duration>>,
}

impl ManualAlarm {
    pub fn restart_count(&self) -> usize {
        self.inner.restarts.load(Ordering::SeqCst)
    }

    pub fn pending(&self) -> Option<Duration> {
        *self.inner.pending.lock().unwrap()
    }

    /// Mark the pending shot as fired; the test then calls the matching
    /// reader entry point.
    pub fn expire(&self) -> bool {
        self.inner.pending.lock().unwrap().take().is_some()
    }
}

impl DebounceAlarm for ManualAlarm {
    fn restart(&self, timeout: Duration) -> Result<(), Error> {
        self.inner.restarts.fetch_add(1, Ordering::SeqCst);
        *self.inner.pending.lock().unwrap() = Some(timeout);
        Ok(())
    }

    fn cancel(&self) -> Result<bool, Error> {
        Ok(self.inner.pending.lock().unwrap().take().is_some())
    }
}

#[derive(Clone, Default)]
pub struct RecordingOutput {
    pub events: Arc<Mutex<Vec<(&'static str, bool)>>>,
}

impl PulseOutput for RecordingOutput {
    fn set_click(&mut self, on: bool) {
        self.events.lock().unwrap().push(("click", on));
    }

    fn set_indicator(&mut self, on: bool) {
        self.events.lock().unwrap().push(("indicator", on));
    }
}

/// Scripted power host: records the call sequence and can fail the first
/// few enable attempts.
pub struct ScriptedPowerHost {
    pub calls: Arc<Mutex<Vec<&'static str>>>,
    pub enable_failures: usize,
}

impl ScriptedPowerHost {
    pub fn new(enable_failures: usize) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            enable_failures,
        }
    }
}

impl PowerHost for ScriptedPowerHost {
    fn disable_peripherals(&mut self) -> Result<(), Error> {
        self.calls.lock().unwrap().push("disable");
        Ok(())
    }

    fn enable_peripherals(&mut self) -> Result<(), Error> {
        if self.enable_failures > 0 {
            self.enable_failures -= 1;
            self.calls.lock().unwrap().push("enable_failed");
            return Err(Error::Platform(-1));
        }
        self.calls.lock().unwrap().push("enable");
        Ok(())
    }

    fn arm_wake_source(&mut self) -> Result<(), Error> {
        self.calls.lock().unwrap().push("arm_wake");
        Ok(())
    }

    fn switch_released(&self) -> bool {
        true
    }

    fn enter_light_sleep(&mut self) {
        self.calls.lock().unwrap().push("sleep");
    }
}
