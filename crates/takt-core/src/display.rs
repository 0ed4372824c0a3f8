//! Display-facing helpers: glyph indexes and the unconfirmed-BPM blink.
//!
//! The screen itself is a collaborator; it only ever consumes the four
//! glyph indexes and the dim flag computed here.

use crate::settings::{DIM_TOGGLE_FRAMES, GLYPH_STRIDE};
use crate::tempo::TempoState;

/// Indexes into the glyph sheets for the four screen slots: signature, BPM
/// hundreds, tens, ones. Each index is pre-scaled by the glyph stride.
pub fn glyph_indexes(state: &TempoState) -> [u16; 4] {
    let bpm = state.candidate_bpm();
    [
        state.signature() as u16 * GLYPH_STRIDE,
        bpm / 100 * GLYPH_STRIDE,
        bpm / 10 % 10 * GLYPH_STRIDE,
        bpm % 10 * GLYPH_STRIDE,
    ]
}

/// Blink state for an unconfirmed BPM edit: alternating bright and dim
/// phases of a few refresh frames each.
#[derive(Debug, Default)]
pub struct ScreenDimmer {
    frames: u8,
    dim: bool,
}

impl ScreenDimmer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance one refresh frame and report whether the screen should render
    /// dim. Always bright while the BPM is confirmed.
    pub fn is_dim(&mut self, confirmed: bool) -> bool {
        if confirmed {
            self.frames = 0;
            self.dim = false;
            return false;
        }
        self.frames += 1;
        if self.frames > DIM_TOGGLE_FRAMES {
            self.dim = !self.dim;
            self.frames = 0;
        }
        self.dim
    }
}
