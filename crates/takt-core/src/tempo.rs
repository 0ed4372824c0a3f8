//! Shared tempo/signature state, the one cross-thread mutable entity.
//!
//! Lock order is global and fixed: `selected` before `candidate` for every
//! operation that needs both. `signature` and `beat` live under one lock
//! because bar position is a single logical value.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::settings::{
    BPM_MAX, BPM_MIN, BPM_START, SIGNATURE_BEATS, SIGNATURE_COUNT, SIGNATURE_START,
};

/// Recover from a poisoned lock. The guarded values are plain integers; a
/// panicking writer cannot leave them torn. Shared with the host timers.
pub(crate) fn recover<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn clamp_bpm(value: i32) -> u16 {
    value.clamp(i32::from(BPM_MIN), i32::from(BPM_MAX)) as u16
}

#[derive(Debug, Clone, Copy)]
struct Bar {
    signature: usize,
    beat: u16,
}

/// Tempo and signature store. Edits accumulate in the candidate BPM; a
/// confirming gesture promotes it to the selected BPM that the beat
/// scheduler runs on.
pub struct TempoState {
    selected: Mutex<u16>,
    candidate: Mutex<u16>,
    bar: Mutex<Bar>,
    system_on: AtomicBool,
}

impl TempoState {
    pub fn new() -> Self {
        Self {
            selected: Mutex::new(BPM_START),
            candidate: Mutex::new(BPM_START),
            bar: Mutex::new(Bar {
                signature: SIGNATURE_START,
                beat: 0,
            }),
            system_on: AtomicBool::new(true),
        }
    }

    pub fn selected_bpm(&self) -> u16 {
        *recover(&self.selected)
    }

    pub fn candidate_bpm(&self) -> u16 {
        *recover(&self.candidate)
    }

    /// Shift the candidate BPM, clamped to the supported range.
    pub fn change_bpm(&self, delta: i16) {
        let mut candidate = recover(&self.candidate);
        *candidate = clamp_bpm(i32::from(*candidate) + i32::from(delta));
    }

    /// Commit the candidate as the selected BPM.
    pub fn select_bpm(&self) {
        let mut selected = recover(&self.selected);
        let candidate = recover(&self.candidate);
        *selected = *candidate;
    }

    /// Throw away an uncommitted edit.
    pub fn reset_candidate_bpm(&self) {
        let selected = recover(&self.selected);
        let mut candidate = recover(&self.candidate);
        *candidate = *selected;
    }

    pub fn bpm_confirmed(&self) -> bool {
        let selected = recover(&self.selected);
        let candidate = recover(&self.candidate);
        *selected == *candidate
    }

    /// Step to the next time signature, wrapping past the last one.
    pub fn change_signature(&self) {
        let mut bar = recover(&self.bar);
        bar.signature = (bar.signature + 1) % SIGNATURE_COUNT;
    }

    pub fn signature(&self) -> usize {
        recover(&self.bar).signature
    }

    pub fn beat(&self) -> u16 {
        recover(&self.bar).beat
    }

    /// Advance the beat counter, wrapping at the current signature's bar
    /// length.
    pub fn increment_beat(&self) {
        let mut bar = recover(&self.bar);
        bar.beat = (bar.beat + 1) % SIGNATURE_BEATS[bar.signature];
    }

    pub fn system_on(&self) -> bool {
        self.system_on.load(Ordering::Acquire)
    }

    pub fn set_system(&self, on: bool) {
        self.system_on.store(on, Ordering::Release);
    }
}

impl Default for TempoState {
    fn default() -> Self {
        Self::new()
    }
}
