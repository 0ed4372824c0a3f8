//! Sleep-request orchestration: peripheral teardown, light sleep, recovery.

use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::error::Error;
use crate::settings::{PERIPHERAL_RETRY_BACKOFF, PERIPHERAL_SETTLE, PIN_RELEASE_POLL};
use crate::tempo::TempoState;

/// Hardware side of the sleep sequence.
pub trait PowerHost {
    /// Stop the beat alarm and the encoder interrupts.
    fn disable_peripherals(&mut self) -> Result<(), Error>;
    /// Restart everything stopped by `disable_peripherals`.
    fn enable_peripherals(&mut self) -> Result<(), Error>;
    /// Configure the switch pin as the wake source (low level).
    fn arm_wake_source(&mut self) -> Result<(), Error>;
    /// Whether the switch pin currently reads released (high).
    fn switch_released(&self) -> bool;
    /// Enter light sleep; returns when the wake interrupt fires.
    fn enter_light_sleep(&mut self);
}

/// Walks On → Disabling → Asleep → Enabling → On for every sleep request on
/// its channel.
pub struct PowerOrchestrator<H: PowerHost> {
    state: Arc<TempoState>,
    host: H,
}

impl<H: PowerHost> PowerOrchestrator<H> {
    pub fn new(state: Arc<TempoState>, host: H) -> Self {
        Self { state, host }
    }

    /// Wait for sleep requests until the producer side goes away.
    pub fn run(mut self, requests: Receiver<()>) {
        log::info!("power orchestrator running");
        loop {
            match requests.recv_timeout(Duration::from_secs(5)) {
                Ok(()) => self.service_request(),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    log::info!("sleep request channel closed, orchestrator stopping");
                    return;
                }
            }
        }
    }

    /// One full sleep/wake round trip.
    pub fn service_request(&mut self) {
        log::info!("sleep requested, disabling peripherals");
        self.state.set_system(false);
        if let Err(err) = self.host.disable_peripherals() {
            // The sleep still has to happen; anything half-stopped is
            // recovered by the retry loop on wake.
            log::error!("failed to disable peripherals: {}", err);
        }
        thread::sleep(PERIPHERAL_SETTLE);

        if let Err(err) = self.host.arm_wake_source() {
            log::error!("failed to arm wake source: {}", err);
        }
        // A held press must fully clear before sleeping, otherwise the wake
        // condition is already satisfied and the sleep exits immediately.
        self.wait_for_release();
        thread::sleep(PERIPHERAL_SETTLE);

        log::info!("entering light sleep");
        self.host.enter_light_sleep();
        log::info!("woke from light sleep");
        self.wait_for_release();

        // No degraded mode exists, so this is the one place unbounded retry
        // is correct.
        while let Err(err) = self.host.enable_peripherals() {
            log::error!("failed to enable peripherals: {}", err);
            thread::sleep(PERIPHERAL_RETRY_BACKOFF);
        }
        self.state.set_system(true);
        log::info!("system back on");
    }

    fn wait_for_release(&self) {
        while !self.host.switch_released() {
            thread::sleep(PIN_RELEASE_POLL);
        }
    }
}
