//! Compile-time tuning: thresholds, defaults, bounds and queue depths.
//! Pin assignments live with the firmware.

use core::time::Duration;

// ******* Tempo *******
pub const BPM_START: u16 = 80;
pub const BPM_MIN: u16 = 1;
pub const BPM_MAX: u16 = 999;
pub const SIGNATURE_START: usize = 0;
/// Beats per bar for each selectable time signature (4/4, 3/4, 6/8).
pub const SIGNATURE_BEATS: [u16; 3] = [4, 3, 6];
pub const SIGNATURE_COUNT: usize = SIGNATURE_BEATS.len();

// ******* Encoder input *******
pub const FAST_CHANGE_MULTIPLIER: i16 = 5;
/// Same-direction ticks closer than this count towards fast changes.
pub const FAST_CHANGE_US: u64 = 100_000;
/// A gap longer than this resets the fast-change streak.
pub const FAST_CHANGE_EXPIRE_US: u64 = 1_000_000;
pub const ENC_A_DEBOUNCE_US: u64 = 1_000;
pub const ENC_B_DEBOUNCE_US: u64 = 1_000;
pub const ENC_SW_DEBOUNCE_US: u64 = 100_000;
pub const ENC_SW_LONGPRESS_US: u64 = 2_000_000;
/// An unconfirmed BPM edit reverts after this much inactivity.
pub const IDLE_REVERT_TIMEOUT: Duration = Duration::from_secs(5);

// ******* Channels *******
// Depths must exceed any plausible event burst.
pub const TICK_QUEUE_DEPTH: usize = 10;
pub const PULSE_QUEUE_DEPTH: usize = 10;
pub const SLEEP_QUEUE_DEPTH: usize = 10;

// ******* Output *******
pub const OUTPUT_ACTIVATION_DURATION: Duration = Duration::from_millis(100);
/// Offset of the first beat after the scheduler starts.
pub const FIRST_BEAT_DELAY_US: u64 = 1_000_000;

// ******* Power sequencing *******
pub const PERIPHERAL_SETTLE: Duration = Duration::from_millis(100);
pub const PERIPHERAL_RETRY_BACKOFF: Duration = Duration::from_secs(1);
pub const PIN_RELEASE_POLL: Duration = Duration::from_millis(10);

// ******* Screen *******
pub const SCREEN_REFRESH_PERIOD: Duration = Duration::from_millis(42);
/// Frames per blink phase while a BPM edit is unconfirmed.
pub const DIM_TOGGLE_FRAMES: u8 = 4;
/// Glyph sheets store one image every this many entries.
pub const GLYPH_STRIDE: u16 = 256;
