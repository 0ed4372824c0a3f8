//! esp_timer-backed implementations of the core's clock and alarm seams.

use std::sync::Mutex;
use std::time::Duration;

use esp_idf_svc::sys;
use esp_idf_svc::timer::{EspTimer, EspTimerService, Task};

use takt_core::{Clock, DebounceAlarm, Error};

pub fn platform(err: sys::EspError) -> Error {
    Error::Platform(err.code())
}

/// Microsecond clock from the ESP high-resolution timer.
#[derive(Clone, Copy, Default)]
pub struct EspClock;

impl Clock for EspClock {
    fn now_us(&self) -> u64 {
        unsafe { sys::esp_timer_get_time() as u64 }
    }
}

/// Restartable one-shot alarm over an `EspTimer`. Scheduling `after` on an
/// active timer re-arms it, which is exactly the restart-not-skip debounce
/// semantics. All callers run in task context (the edge pumps and the timer
/// service task), so the short lock never blocks an ISR.
pub struct EspAlarm {
    timer: Mutex<EspTimer<'static>>,
}

impl EspAlarm {
    pub fn new<F>(service: &EspTimerService<Task>, callback: F) -> Result<Self, sys::EspError>
    where
        F: FnMut() + Send + 'static,
    {
        Ok(Self {
            timer: Mutex::new(service.timer(callback)?),
        })
    }
}

impl DebounceAlarm for EspAlarm {
    fn restart(&self, timeout: Duration) -> Result<(), Error> {
        let mut timer = self.timer.lock().unwrap_or_else(|p| p.into_inner());
        timer.after(timeout).map_err(platform)
    }

    fn cancel(&self) -> Result<bool, Error> {
        let mut timer = self.timer.lock().unwrap_or_else(|p| p.into_inner());
        timer.cancel().map_err(platform)
    }
}
