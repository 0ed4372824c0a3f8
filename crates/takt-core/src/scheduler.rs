//! Tempo-locked beat scheduling and the pulse worker.
//!
//! The alarm side decides *when* the next beat fires and hands actuation off
//! through a bounded channel; the worker side owns the physical pins and may
//! block while shaping the pulse.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread;

use crate::settings::OUTPUT_ACTIVATION_DURATION;
use crate::tempo::TempoState;

/// Lifecycle of the beat alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Disabled,
    Armed,
    Running,
}

/// Microseconds between beats at the given tempo.
pub fn beat_period_us(bpm: u16) -> u64 {
    60_000_000 / u64::from(bpm.max(1))
}

/// Handoff signal from the beat alarm to the pulse worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseSignal;

/// Bounded handoff queue; the alarm side never blocks on it.
pub struct PulseQueue {
    tx: SyncSender<PulseSignal>,
    dropped: AtomicU32,
}

impl PulseQueue {
    pub fn bounded(depth: usize) -> (Arc<Self>, Receiver<PulseSignal>) {
        let (tx, rx) = sync_channel(depth);
        (
            Arc::new(Self {
                tx,
                dropped: AtomicU32::new(0),
            }),
            rx,
        )
    }

    /// Non-blocking push from alarm context; overflow means the worker is
    /// wedged, which the counter makes visible.
    pub fn push_from_alarm(&self) {
        if let Err(err) = self.tx.try_send(PulseSignal) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            match err {
                TrySendError::Full(_) => log::warn!("pulse queue full, dropping beat"),
                TrySendError::Disconnected(_) => log::error!("pulse queue disconnected"),
            }
        }
    }

    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Per-firing decision logic for the self-rescheduling beat alarm.
///
/// The next target always accumulates from the previous alarm's *target*,
/// never from "now", so callback dispatch latency cannot build up drift.
pub struct BeatScheduler {
    state: Arc<TempoState>,
    pulses: Arc<PulseQueue>,
}

impl BeatScheduler {
    pub fn new(state: Arc<TempoState>, pulses: Arc<PulseQueue>) -> Self {
        Self { state, pulses }
    }

    /// Runs in alarm context; never blocks. Returns the next absolute alarm
    /// target in microseconds. While the system is off no pulse is signaled,
    /// but the target still advances so a resume stays period-aligned.
    pub fn on_alarm(&self, prev_target_us: u64) -> u64 {
        if self.state.system_on() {
            self.pulses.push_from_alarm();
        }
        prev_target_us + beat_period_us(self.state.selected_bpm())
    }
}

/// Physical click/indicator outputs. Owned exclusively by the pulse worker
/// while a pulse is in flight; the alarm callback never touches them.
pub trait PulseOutput: Send {
    fn set_click(&mut self, on: bool);
    fn set_indicator(&mut self, on: bool);
}

/// Blocking actuation worker: one bounded click per queued signal,
/// independent of BPM.
pub struct PulseWorker<O: PulseOutput> {
    state: Arc<TempoState>,
    output: O,
}

impl<O: PulseOutput> PulseWorker<O> {
    pub fn new(state: Arc<TempoState>, output: O) -> Self {
        Self { state, output }
    }

    /// Consume signals until the alarm side goes away.
    pub fn run(mut self, signals: Receiver<PulseSignal>) {
        log::info!("pulse worker running");
        while signals.recv().is_ok() {
            self.service_signal();
        }
        log::info!("pulse channel closed, worker stopping");
    }

    /// Handle one queued beat.
    pub fn service_signal(&mut self) {
        if !self.state.system_on() {
            self.output.set_click(false);
            self.output.set_indicator(false);
            return;
        }
        let accent = self.state.beat() == 1;
        self.click(accent);
        self.state.increment_beat();
    }

    /// Accented beats click twice as long and light the indicator.
    fn click(&mut self, accent: bool) {
        self.output.set_indicator(accent);
        self.output.set_click(true);
        let hold = if accent {
            OUTPUT_ACTIVATION_DURATION * 2
        } else {
            OUTPUT_ACTIVATION_DURATION
        };
        thread::sleep(hold);
        self.output.set_click(false);
        self.output.set_indicator(false);
    }
}
