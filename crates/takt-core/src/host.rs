//! Std-host implementations of the hardware seams: a monotonic clock,
//! restartable debounce alarms, and the self-rescheduling beat timer.
//!
//! The desktop simulator and the integration tests run the full core on top
//! of these; the firmware has esp_timer-backed equivalents.

use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::encoder::{Clock, DebounceAlarm};
use crate::error::Error;
use crate::scheduler::{BeatScheduler, SchedulerState};
use crate::settings::FIRST_BEAT_DELAY_US;
use crate::tempo::recover;

/// Monotonic clock anchored at construction.
#[derive(Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_us(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }
}

struct AlarmSlot {
    deadline: Option<Instant>,
    shutdown: bool,
}

/// Thread-backed restartable one-shot alarm. Each `restart` pushes the
/// deadline out; the callback runs on the alarm's own thread at expiry.
pub struct HostAlarm {
    slot: Arc<(Mutex<AlarmSlot>, Condvar)>,
}

impl HostAlarm {
    pub fn new<F: Fn() + Send + 'static>(callback: F) -> Self {
        let slot = Arc::new((
            Mutex::new(AlarmSlot {
                deadline: None,
                shutdown: false,
            }),
            Condvar::new(),
        ));
        let worker_slot = Arc::clone(&slot);
        thread::spawn(move || alarm_worker(worker_slot, callback));
        Self { slot }
    }
}

fn alarm_worker<F: Fn()>(slot: Arc<(Mutex<AlarmSlot>, Condvar)>, callback: F) {
    let (lock, cv) = &*slot;
    let mut guard = recover(lock);
    loop {
        if guard.shutdown {
            return;
        }
        match guard.deadline {
            None => {
                guard = cv
                    .wait(guard)
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
            }
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    guard.deadline = None;
                    drop(guard);
                    callback();
                    guard = recover(lock);
                } else {
                    let (next, _) = cv
                        .wait_timeout(guard, deadline - now)
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                    guard = next;
                }
            }
        }
    }
}

impl DebounceAlarm for HostAlarm {
    fn restart(&self, timeout: Duration) -> Result<(), Error> {
        let (lock, cv) = &*self.slot;
        let mut slot = recover(lock);
        slot.deadline = Some(Instant::now() + timeout);
        cv.notify_one();
        Ok(())
    }

    fn cancel(&self) -> Result<bool, Error> {
        let (lock, cv) = &*self.slot;
        let mut slot = recover(lock);
        let was_pending = slot.deadline.take().is_some();
        cv.notify_one();
        Ok(was_pending)
    }
}

impl Drop for HostAlarm {
    fn drop(&mut self) {
        let (lock, cv) = &*self.slot;
        recover(lock).shutdown = true;
        cv.notify_one();
    }
}

struct BeatCtl {
    state: SchedulerState,
    target_us: u64,
    shutdown: bool,
}

/// Thread-backed self-rescheduling beat alarm: every expiry asks the
/// scheduler for the next absolute target.
pub struct HostBeatTimer {
    ctl: Arc<(Mutex<BeatCtl>, Condvar)>,
    clock: SystemClock,
}

impl HostBeatTimer {
    /// Registers the worker; the alarm stays unscheduled until `start`.
    pub fn new(scheduler: Arc<BeatScheduler>, clock: SystemClock) -> Self {
        let ctl = Arc::new((
            Mutex::new(BeatCtl {
                state: SchedulerState::Armed,
                target_us: 0,
                shutdown: false,
            }),
            Condvar::new(),
        ));
        let worker_ctl = Arc::clone(&ctl);
        let worker_clock = clock.clone();
        thread::spawn(move || beat_worker(worker_ctl, scheduler, worker_clock));
        Self { ctl, clock }
    }

    /// The first beat fires a fixed delay after start; later beats
    /// accumulate from the previous target.
    pub fn start(&self) {
        let (lock, cv) = &*self.ctl;
        let mut ctl = recover(lock);
        if ctl.state == SchedulerState::Running {
            return;
        }
        ctl.target_us = self.clock.now_us() + FIRST_BEAT_DELAY_US;
        ctl.state = SchedulerState::Running;
        cv.notify_one();
    }

    /// Idempotent.
    pub fn stop(&self) {
        let (lock, cv) = &*self.ctl;
        recover(lock).state = SchedulerState::Disabled;
        cv.notify_one();
    }

    pub fn state(&self) -> SchedulerState {
        recover(&self.ctl.0).state
    }
}

fn beat_worker(
    ctl: Arc<(Mutex<BeatCtl>, Condvar)>,
    scheduler: Arc<BeatScheduler>,
    clock: SystemClock,
) {
    let (lock, cv) = &*ctl;
    let mut guard = recover(lock);
    loop {
        if guard.shutdown {
            return;
        }
        if guard.state != SchedulerState::Running {
            guard = cv
                .wait(guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            continue;
        }
        let now = clock.now_us();
        if now >= guard.target_us {
            guard.target_us = scheduler.on_alarm(guard.target_us);
        } else {
            let wait = Duration::from_micros(guard.target_us - now);
            let (next, _) = cv
                .wait_timeout(guard, wait)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            guard = next;
        }
    }
}

impl Drop for HostBeatTimer {
    fn drop(&mut self) {
        let (lock, cv) = &*self.ctl;
        recover(lock).shutdown = true;
        cv.notify_one();
    }
}
