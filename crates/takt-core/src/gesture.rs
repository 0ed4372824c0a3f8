//! Tick interpreter: repeat acceleration, select semantics, idle revert.

use std::sync::mpsc::{Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::settings::{
    FAST_CHANGE_EXPIRE_US, FAST_CHANGE_MULTIPLIER, FAST_CHANGE_US, IDLE_REVERT_TIMEOUT,
};
use crate::tempo::TempoState;
use crate::tick::{Tick, TickAction};

/// Per-gesture repeat tracker. Touching one tracker always zeroes the other
/// two, so gestures cannot interleave within a debounce-respecting window.
#[derive(Debug, Default)]
struct ActionTracker {
    prev_tick_us: u64,
    consecutive: u32,
}

/// Single consumer of the tick channel; processes ticks one at a time in
/// arrival order and is the only writer of the trackers.
pub struct GestureInterpreter {
    state: Arc<TempoState>,
    sleep_tx: SyncSender<()>,
    select: ActionTracker,
    up: ActionTracker,
    down: ActionTracker,
    /// Rotation sign of the immediately preceding tick; zero after a select.
    prev_rotation: i16,
}

impl GestureInterpreter {
    pub fn new(state: Arc<TempoState>, sleep_tx: SyncSender<()>) -> Self {
        Self {
            state,
            sleep_tx,
            select: ActionTracker::default(),
            up: ActionTracker::default(),
            down: ActionTracker::default(),
            prev_rotation: 0,
        }
    }

    /// Consume ticks until the producer side goes away.
    pub fn run(mut self, ticks: Receiver<Tick>) {
        log::info!("gesture interpreter running");
        loop {
            match ticks.recv_timeout(IDLE_REVERT_TIMEOUT) {
                Ok(tick) => {
                    if !self.state.system_on() {
                        // Edges raced the shutdown; nothing to interpret.
                        thread::sleep(Duration::from_millis(10));
                        continue;
                    }
                    self.handle_tick(tick);
                }
                Err(RecvTimeoutError::Timeout) => self.idle_timeout(),
                Err(RecvTimeoutError::Disconnected) => {
                    log::info!("tick channel closed, interpreter stopping");
                    return;
                }
            }
        }
    }

    /// Apply a single tick.
    pub fn handle_tick(&mut self, tick: Tick) {
        match tick.action {
            TickAction::Select => self.handle_select(tick),
            TickAction::SleepRequest => self.forward_sleep_request(),
            TickAction::RotateLeft | TickAction::RotateRight => {
                let delta = self.track_rotation(tick);
                self.state.change_bpm(delta);
            }
        }
    }

    /// Revert an unconfirmed edit once the idle window passes.
    pub fn idle_timeout(&mut self) {
        if !self.state.bpm_confirmed() {
            self.state.reset_candidate_bpm();
            log::info!(
                "BPM change not confirmed in time, reverting to {}",
                self.state.selected_bpm()
            );
        }
    }

    /// A pending edit is committed; with nothing pending the click advances
    /// the time signature instead.
    fn handle_select(&mut self, tick: Tick) {
        self.up.consecutive = 0;
        self.down.consecutive = 0;

        if !self.state.bpm_confirmed() {
            log::info!("changing the BPM to {}", self.state.candidate_bpm());
            self.state.select_bpm();
        } else {
            log::info!("changing the signature mode");
            self.state.change_signature();
        }

        self.select.consecutive += 1;
        self.select.prev_tick_us = tick.at_us;
        self.prev_rotation = 0;
    }

    /// Update the repeat tracker for one rotation tick and return the BPM
    /// delta it earns: plain direction, or multiplied after more than three
    /// fast same-direction ticks.
    fn track_rotation(&mut self, tick: Tick) -> i16 {
        let direction = tick.action.rotation();
        self.select.consecutive = 0;
        let tracker = if direction > 0 {
            self.down.consecutive = 0;
            &mut self.up
        } else {
            self.up.consecutive = 0;
            &mut self.down
        };

        let gap = tick.at_us.saturating_sub(tracker.prev_tick_us);
        if gap < FAST_CHANGE_US && direction == self.prev_rotation {
            tracker.consecutive += 1;
        } else if gap > FAST_CHANGE_EXPIRE_US || direction != self.prev_rotation {
            tracker.consecutive = 1;
        }
        tracker.prev_tick_us = tick.at_us;
        self.prev_rotation = direction;

        if tracker.consecutive > 3 {
            direction * FAST_CHANGE_MULTIPLIER
        } else {
            direction
        }
    }

    fn forward_sleep_request(&self) {
        match self.sleep_tx.try_send(()) {
            Ok(()) => {}
            // A request is already queued; one sleep is as good as two.
            Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => {
                log::error!("sleep request channel disconnected");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::sync_channel;

    use crate::settings::BPM_START;

    fn interpreter() -> (GestureInterpreter, Arc<TempoState>, Receiver<()>) {
        let state = Arc::new(TempoState::new());
        let (sleep_tx, sleep_rx) = sync_channel(1);
        (
            GestureInterpreter::new(Arc::clone(&state), sleep_tx),
            state,
            sleep_rx,
        )
    }

    fn rotate(at_us: u64, right: bool) -> Tick {
        Tick {
            at_us,
            action: if right {
                TickAction::RotateRight
            } else {
                TickAction::RotateLeft
            },
        }
    }

    #[test]
    fn single_rotation_moves_candidate_by_one() {
        let (mut interp, state, _rx) = interpreter();
        interp.handle_tick(rotate(1_000, true));
        assert_eq!(state.candidate_bpm(), BPM_START + 1);
        interp.handle_tick(rotate(2_000_000, false));
        assert_eq!(state.candidate_bpm(), BPM_START);
    }

    #[test]
    fn fourth_fast_tick_earns_the_multiplier() {
        let (mut interp, state, _rx) = interpreter();
        // Well inside the fast window.
        for at_us in [0, 50_000, 140_000, 180_000] {
            interp.handle_tick(rotate(at_us, true));
        }
        // Three singles, then one multiplied step.
        assert_eq!(
            state.candidate_bpm(),
            BPM_START + 3 + FAST_CHANGE_MULTIPLIER as u16
        );
    }

    #[test]
    fn long_gap_resets_the_streak() {
        let (mut interp, state, _rx) = interpreter();
        for at_us in [0, 50_000, 90_000, 130_000] {
            interp.handle_tick(rotate(at_us, true));
        }
        // Streak is hot; an expired gap drops the next tick back to one.
        interp.handle_tick(rotate(130_000 + FAST_CHANGE_EXPIRE_US + 1, true));
        assert_eq!(
            state.candidate_bpm(),
            BPM_START + 3 + FAST_CHANGE_MULTIPLIER as u16 + 1
        );
        // And the one after that is a plain step too.
        interp.handle_tick(rotate(130_000 + FAST_CHANGE_EXPIRE_US + 2_000_000, true));
        assert_eq!(
            state.candidate_bpm(),
            BPM_START + 3 + FAST_CHANGE_MULTIPLIER as u16 + 2
        );
    }

    #[test]
    fn direction_change_resets_the_streak() {
        let (mut interp, state, _rx) = interpreter();
        for at_us in [0, 40_000, 80_000, 120_000] {
            interp.handle_tick(rotate(at_us, true));
        }
        // Opposite direction immediately after: single step down.
        interp.handle_tick(rotate(160_000, false));
        assert_eq!(
            state.candidate_bpm(),
            BPM_START + 3 + FAST_CHANGE_MULTIPLIER as u16 - 1
        );
    }

    #[test]
    fn select_commits_a_pending_edit() {
        let (mut interp, state, _rx) = interpreter();
        interp.handle_tick(rotate(0, true));
        interp.handle_tick(Tick {
            at_us: 10_000,
            action: TickAction::Select,
        });
        assert_eq!(state.selected_bpm(), BPM_START + 1);
        assert!(state.bpm_confirmed());
    }

    #[test]
    fn select_with_nothing_pending_changes_signature() {
        let (mut interp, state, _rx) = interpreter();
        interp.handle_tick(Tick {
            at_us: 0,
            action: TickAction::Select,
        });
        assert_eq!(state.signature(), 1);
        assert_eq!(state.selected_bpm(), BPM_START);
    }

    #[test]
    fn select_interrupts_a_fast_streak() {
        let (mut interp, state, _rx) = interpreter();
        for at_us in [0, 40_000, 80_000] {
            interp.handle_tick(rotate(at_us, true));
        }
        interp.handle_tick(Tick {
            at_us: 100_000,
            action: TickAction::Select,
        });
        // The streak restarts from one even though the gap is tiny.
        interp.handle_tick(rotate(120_000, true));
        assert_eq!(state.candidate_bpm(), state.selected_bpm() + 1);
    }

    #[test]
    fn sleep_request_is_forwarded_not_applied() {
        let (mut interp, state, sleep_rx) = interpreter();
        interp.handle_tick(Tick {
            at_us: 0,
            action: TickAction::SleepRequest,
        });
        assert_eq!(sleep_rx.try_recv(), Ok(()));
        assert_eq!(state.candidate_bpm(), BPM_START);
        assert_eq!(state.signature(), 0);
    }

    #[test]
    fn idle_timeout_reverts_exactly_once() {
        let (mut interp, state, _rx) = interpreter();
        interp.handle_tick(rotate(0, true));
        assert!(!state.bpm_confirmed());
        interp.idle_timeout();
        assert!(state.bpm_confirmed());
        assert_eq!(state.candidate_bpm(), BPM_START);
        // A second timeout with nothing pending is a no-op.
        interp.idle_timeout();
        assert_eq!(state.candidate_bpm(), BPM_START);
    }
}
