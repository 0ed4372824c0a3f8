//! Error type shared across the core and its hardware seams.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A bounded channel was full outside alarm context; the queue depth is
    /// sized for worst-case bursts, so this is a configuration error.
    QueueFull,
    /// The consumer side of a channel is gone.
    Disconnected,
    /// A one-time wiring step ran twice.
    AlreadyInitialized,
    /// A platform timer/alarm call failed (carries the platform error code).
    Platform(i32),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::QueueFull => write!(f, "bounded channel full"),
            Error::Disconnected => write!(f, "channel consumer disconnected"),
            Error::AlreadyInitialized => write!(f, "component already initialized"),
            Error::Platform(code) => write!(f, "platform call failed (code {})", code),
        }
    }
}

impl std::error::Error for Error {}
