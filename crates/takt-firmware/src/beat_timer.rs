//! Self-rescheduling beat alarm over the esp_timer service.
//!
//! Each firing asks the scheduler for the next absolute target and re-arms
//! for `target - now`; because the target accumulates from the previous
//! target, dispatch latency never becomes drift.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use esp_idf_svc::sys::EspError;
use esp_idf_svc::timer::{EspTimer, EspTimerService, Task};

use takt_core::settings::FIRST_BEAT_DELAY_US;
use takt_core::{BeatScheduler, Clock, SchedulerState};

use crate::alarms::EspClock;

type TimerSlot = Arc<Mutex<Option<EspTimer<'static>>>>;

fn locked<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct BeatTimer {
    slot: TimerSlot,
    target_us: Arc<AtomicU64>,
    state: Arc<Mutex<SchedulerState>>,
}

impl BeatTimer {
    /// Register the alarm callback; the timer stays unscheduled until
    /// `start`.
    pub fn setup(
        service: &EspTimerService<Task>,
        scheduler: Arc<BeatScheduler>,
    ) -> Result<Self, EspError> {
        let slot: TimerSlot = Arc::new(Mutex::new(None));
        let target_us = Arc::new(AtomicU64::new(0));
        let state = Arc::new(Mutex::new(SchedulerState::Armed));

        let cb_slot = Arc::clone(&slot);
        let cb_target = Arc::clone(&target_us);
        let cb_state = Arc::clone(&state);
        let timer = service.timer(move || {
            // A firing that raced `stop` must not re-arm the alarm.
            if *locked(&cb_state) != SchedulerState::Running {
                return;
            }
            let prev = cb_target.load(Ordering::Acquire);
            let next = scheduler.on_alarm(prev);
            cb_target.store(next, Ordering::Release);

            let now = EspClock.now_us();
            if let Some(timer) = locked(&cb_slot).as_mut() {
                if let Err(err) = timer.after(Duration::from_micros(next.saturating_sub(now))) {
                    log::error!("beat alarm re-arm failed: {}", err);
                }
            }
        })?;
        *locked(&slot) = Some(timer);

        Ok(Self {
            slot,
            target_us,
            state,
        })
    }

    /// The first beat fires a fixed delay after start; later beats
    /// accumulate from the previous target.
    pub fn start(&self) -> Result<(), EspError> {
        let mut state = locked(&self.state);
        if *state == SchedulerState::Running {
            return Ok(());
        }
        self.target_us
            .store(EspClock.now_us() + FIRST_BEAT_DELAY_US, Ordering::Release);
        if let Some(timer) = locked(&self.slot).as_mut() {
            timer.after(Duration::from_micros(FIRST_BEAT_DELAY_US))?;
        }
        *state = SchedulerState::Running;
        log::info!("beat timer running");
        Ok(())
    }

    /// Idempotent.
    pub fn stop(&self) -> Result<(), EspError> {
        let mut state = locked(&self.state);
        if let Some(timer) = locked(&self.slot).as_mut() {
            timer.cancel()?;
        }
        *state = SchedulerState::Disabled;
        log::info!("beat timer stopped");
        Ok(())
    }

    pub fn state(&self) -> SchedulerState {
        *locked(&self.state)
    }
}
