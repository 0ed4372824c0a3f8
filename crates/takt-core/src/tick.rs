//! Debounced input events and the bounded queue that carries them.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::Arc;

use crate::error::Error;

/// What a debounced event turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    RotateLeft,
    RotateRight,
    Select,
    SleepRequest,
}

impl TickAction {
    /// Signed rotation step; zero for the button actions.
    pub fn rotation(self) -> i16 {
        match self {
            TickAction::RotateLeft => -1,
            TickAction::RotateRight => 1,
            TickAction::Select | TickAction::SleepRequest => 0,
        }
    }
}

/// One classified physical event, stamped with the firing time of the
/// debounce alarm that produced it (monotonic microseconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub at_us: u64,
    pub action: TickAction,
}

/// Bounded single-consumer tick queue.
///
/// Alarm-context producers must not block: a full queue degrades to a
/// last-tick-wins drop, counted so it shows up in diagnostics instead of
/// vanishing silently.
pub struct TickQueue {
    tx: SyncSender<Tick>,
    dropped: AtomicU32,
}

impl TickQueue {
    pub fn bounded(depth: usize) -> (Arc<Self>, Receiver<Tick>) {
        let (tx, rx) = sync_channel(depth);
        (
            Arc::new(Self {
                tx,
                dropped: AtomicU32::new(0),
            }),
            rx,
        )
    }

    /// Non-blocking push from alarm context.
    pub fn push_from_alarm(&self, tick: Tick) {
        if let Err(err) = self.tx.try_send(tick) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            match err {
                TrySendError::Full(_) => {
                    log::warn!("tick queue full, dropping {:?}", tick.action)
                }
                TrySendError::Disconnected(_) => log::error!("tick queue disconnected"),
            }
        }
    }

    /// Push from ordinary thread context, where a full queue is an error.
    pub fn push(&self, tick: Tick) -> Result<(), Error> {
        self.tx.try_send(tick).map_err(|err| match err {
            TrySendError::Full(_) => Error::QueueFull,
            TrySendError::Disconnected(_) => Error::Disconnected,
        })
    }

    /// Ticks lost to a full queue since startup.
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }
}
