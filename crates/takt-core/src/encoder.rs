//! Debounce layer: raw pin edges in, classified ticks out.
//!
//! Pure event logic, no hardware. The host owns the physical pins and the
//! alarm implementations; it forwards edges and alarm expiries here and
//! samples pin levels on our behalf. Edge entry points touch only atomics
//! and alarm restarts, so they are safe to call from interrupt context and
//! can never starve each other.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::error::Error;
use crate::settings::{
    ENC_A_DEBOUNCE_US, ENC_B_DEBOUNCE_US, ENC_SW_DEBOUNCE_US, ENC_SW_LONGPRESS_US,
};
use crate::tick::{Tick, TickAction, TickQueue};

/// Monotonic microsecond clock.
pub trait Clock: Send + Sync {
    fn now_us(&self) -> u64;
}

/// Restartable one-shot alarm. Re-arming an active alarm resets its timeout:
/// the most recent request wins, an arm request is never skipped.
pub trait DebounceAlarm: Send + Sync {
    fn restart(&self, timeout: Duration) -> Result<(), Error>;
    /// Stop a pending alarm. Returns whether one was still pending.
    fn cancel(&self) -> Result<bool, Error>;
}

/// The four one-shot alarms the debouncer schedules.
pub struct EncoderAlarms<A: DebounceAlarm> {
    pub pin_a: A,
    pub pin_b: A,
    pub sw_debounce: A,
    pub sw_longpress: A,
}

/// Quadrature + push-switch debouncer.
///
/// Ordering contract: the B debounce alarm latches the settled phase-B level
/// *before* the A alarm classifies a rotation, so `a_debounce_elapsed` always
/// reads the last settled B state. Swapping the convention (A falling, sample
/// latched B) inverts rotation.
///
/// Alarms are attached after construction because their callbacks refer back
/// to this reader.
pub struct EncoderReader<A: DebounceAlarm, C: Clock> {
    alarms: OnceLock<EncoderAlarms<A>>,
    clock: C,
    queue: Arc<TickQueue>,
    /// Last settled phase-B level, read by the A classification.
    b_latched: AtomicBool,
    /// Instantaneous phase-B sample awaiting its debounce alarm.
    b_sampled: AtomicBool,
}

impl<A: DebounceAlarm, C: Clock> EncoderReader<A, C> {
    pub fn new(clock: C, queue: Arc<TickQueue>) -> Self {
        Self {
            alarms: OnceLock::new(),
            clock,
            queue,
            b_latched: AtomicBool::new(false),
            b_sampled: AtomicBool::new(false),
        }
    }

    /// One-time wiring of the debounce alarms.
    pub fn attach_alarms(&self, alarms: EncoderAlarms<A>) -> Result<(), Error> {
        self.alarms
            .set(alarms)
            .map_err(|_| Error::AlreadyInitialized)
    }

    fn alarms(&self) -> Option<&EncoderAlarms<A>> {
        let alarms = self.alarms.get();
        if alarms.is_none() {
            log::error!("encoder edge before alarms were attached");
        }
        alarms
    }

    fn restart(alarm: &A, name: &str, timeout_us: u64) {
        if let Err(err) = alarm.restart(Duration::from_micros(timeout_us)) {
            log::warn!("{} debounce alarm restart failed: {}", name, err);
        }
    }

    /// Negative edge on quadrature phase A.
    pub fn on_a_edge(&self) {
        if let Some(alarms) = self.alarms() {
            Self::restart(&alarms.pin_a, "A", ENC_A_DEBOUNCE_US);
        }
    }

    /// Any edge on quadrature phase B; `level_high` is the level sampled at
    /// the edge.
    pub fn on_b_edge(&self, level_high: bool) {
        self.b_sampled.store(level_high, Ordering::Release);
        if let Some(alarms) = self.alarms() {
            Self::restart(&alarms.pin_b, "B", ENC_B_DEBOUNCE_US);
        }
    }

    /// Edge on the push switch; `level_high` is the level sampled at the
    /// edge. The switch is active low, so `false` means pressed.
    pub fn on_sw_edge(&self, level_high: bool) {
        let Some(alarms) = self.alarms() else {
            return;
        };
        if !level_high {
            // Press: start the long-press countdown.
            Self::restart(&alarms.sw_longpress, "long-press", ENC_SW_LONGPRESS_US);
        } else {
            // Release: only a press shorter than the long-press threshold
            // becomes a select; once the long press has fired, the release
            // must not produce a second gesture.
            match alarms.sw_longpress.cancel() {
                Ok(true) => Self::restart(&alarms.sw_debounce, "switch", ENC_SW_DEBOUNCE_US),
                Ok(false) => {}
                Err(err) => log::warn!("long-press alarm cancel failed: {}", err),
            }
        }
    }

    /// A debounce alarm expired; `a_low` is the phase-A level at expiry.
    pub fn a_debounce_elapsed(&self, a_low: bool) {
        if !a_low {
            return;
        }
        let action = if self.b_latched.load(Ordering::Acquire) {
            TickAction::RotateRight
        } else {
            TickAction::RotateLeft
        };
        self.emit(action);
    }

    /// B debounce alarm expired: latch the settled level for classification.
    pub fn b_debounce_elapsed(&self) {
        self.b_latched
            .store(self.b_sampled.load(Ordering::Acquire), Ordering::Release);
    }

    /// Switch debounce alarm expired: the press was a select.
    pub fn sw_debounce_elapsed(&self) {
        self.emit(TickAction::Select);
    }

    /// Long-press alarm expired: request sleep without waiting for release.
    pub fn sw_longpress_elapsed(&self) {
        self.emit(TickAction::SleepRequest);
    }

    fn emit(&self, action: TickAction) {
        self.queue.push_from_alarm(Tick {
            at_us: self.clock.now_us(),
            action,
        });
    }

    /// Ticks lost to a full queue since startup.
    pub fn dropped_ticks(&self) -> u32 {
        self.queue.dropped()
    }
}
