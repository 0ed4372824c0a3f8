//! Timing and input core for the Takt metronome.
//! Hardware-free: runs on the ESP32 firmware, the desktop simulator, and in
//! tests on the host.

#![forbid(unsafe_code)]
#![cfg_attr(
    not(test),
    deny(
        clippy::expect_used,
        clippy::panic,
        clippy::todo,
        clippy::unimplemented,
        clippy::unreachable,
        clippy::unwrap_used
    )
)]

pub mod display;
pub mod encoder;
pub mod error;
pub mod gesture;
pub mod host;
pub mod power;
pub mod scheduler;
pub mod settings;
pub mod tempo;
pub mod tick;

pub use display::{glyph_indexes, ScreenDimmer};
pub use encoder::{Clock, DebounceAlarm, EncoderAlarms, EncoderReader};
pub use error::Error;
pub use gesture::GestureInterpreter;
pub use power::{PowerHost, PowerOrchestrator};
pub use scheduler::{
    beat_period_us, BeatScheduler, PulseOutput, PulseQueue, PulseSignal, PulseWorker,
    SchedulerState,
};
pub use tempo::TempoState;
pub use tick::{Tick, TickAction, TickQueue};
