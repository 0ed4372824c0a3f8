//! Takt: rotary-encoder metronome firmware for ESP32.
//!
//! Wiring and startup only; the timing, gesture and state logic lives in
//! `takt-core` where it can be tested without flashing.

mod alarms;
mod beat_timer;
mod encoder;
mod outputs;
mod power;
mod screen;

use core::fmt;
use std::io;
use std::sync::mpsc::sync_channel;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use esp_idf_svc::hal::gpio::{IOPin, OutputPin};
use esp_idf_svc::hal::i2c::{config::Config as I2cConfig, I2cDriver};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::units::Hertz;
use esp_idf_svc::sys::{self, EspError};
use esp_idf_svc::timer::EspTaskTimerService;

use takt_core::settings::{PULSE_QUEUE_DEPTH, SLEEP_QUEUE_DEPTH, TICK_QUEUE_DEPTH};
use takt_core::{
    BeatScheduler, EncoderReader, GestureInterpreter, PowerOrchestrator, PulseQueue, PulseWorker,
    TempoState, TickQueue,
};

// ******* Pin setup *******
// Encoder: A = GPIO4, B = GPIO5, switch = GPIO18 (active low, wake source).
// Output: click = GPIO2, indicator LED = GPIO15.
// Screen: I2C SDA = GPIO22, SCL = GPIO23.
const ENC_SW_WAKE_GPIO: i32 = 18;
const I2C_BAUDRATE: Hertz = Hertz(400_000);

const WORKER_STACK_SIZE: usize = 4096;
const POWER_STACK_SIZE: usize = 8192;

#[derive(Debug)]
enum StartupError {
    Esp(EspError),
    Core(takt_core::Error),
    Thread(io::Error),
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartupError::Esp(err) => write!(f, "platform init failed: {}", err),
            StartupError::Core(err) => write!(f, "core init failed: {}", err),
            StartupError::Thread(err) => write!(f, "thread spawn failed: {}", err),
        }
    }
}

impl From<EspError> for StartupError {
    fn from(err: EspError) -> Self {
        StartupError::Esp(err)
    }
}

impl From<takt_core::Error> for StartupError {
    fn from(err: takt_core::Error) -> Self {
        StartupError::Core(err)
    }
}

impl From<io::Error> for StartupError {
    fn from(err: io::Error) -> Self {
        StartupError::Thread(err)
    }
}

fn main() {
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    if let Err(err) = run() {
        // No partially-initialized state is worth keeping; start over.
        log::error!("{}; restarting", err);
        unsafe { sys::esp_restart() };
    }
}

fn run() -> Result<(), StartupError> {
    log::info!("metronome starting");
    let peripherals = Peripherals::take()?;
    let state = Arc::new(TempoState::new());

    let (tick_queue, tick_rx) = TickQueue::bounded(TICK_QUEUE_DEPTH);
    let (pulse_queue, pulse_rx) = PulseQueue::bounded(PULSE_QUEUE_DEPTH);
    let (sleep_tx, sleep_rx) = sync_channel(SLEEP_QUEUE_DEPTH);

    let timer_service = EspTaskTimerService::new()?;

    // Encoder: reader first, then the alarms and pins that call back into it.
    let reader = Arc::new(EncoderReader::new(alarms::EspClock, tick_queue));
    let mut pins = encoder::setup(
        &timer_service,
        &reader,
        peripherals.pins.gpio4.downgrade(),
        peripherals.pins.gpio5.downgrade(),
        peripherals.pins.gpio18.downgrade(),
    )?;

    // Beat alarm and the click outputs.
    let scheduler = Arc::new(BeatScheduler::new(Arc::clone(&state), pulse_queue));
    let beat_timer = Arc::new(beat_timer::BeatTimer::setup(&timer_service, scheduler)?);
    let click_outputs = outputs::ClickOutputs::setup(
        peripherals.pins.gpio2.downgrade_output(),
        peripherals.pins.gpio15.downgrade_output(),
    )?;

    // Status screen.
    let i2c = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio22,
        peripherals.pins.gpio23,
        &I2cConfig::new().baudrate(I2C_BAUDRATE),
    )?;
    screen::spawn(i2c, Arc::clone(&state))?;

    // Worker threads.
    let interpreter = GestureInterpreter::new(Arc::clone(&state), sleep_tx);
    thread::Builder::new()
        .name("gesture".into())
        .stack_size(WORKER_STACK_SIZE)
        .spawn(move || interpreter.run(tick_rx))?;

    let pulse_worker = PulseWorker::new(Arc::clone(&state), click_outputs);
    thread::Builder::new()
        .name("pulse".into())
        .stack_size(WORKER_STACK_SIZE)
        .spawn(move || pulse_worker.run(pulse_rx))?;

    // Bring the peripherals up, then hand them to the power orchestrator.
    pins.enable()?;
    beat_timer.start()?;

    let host = power::EspPowerHost::new(pins, Arc::clone(&beat_timer), ENC_SW_WAKE_GPIO);
    let orchestrator = PowerOrchestrator::new(Arc::clone(&state), host);
    thread::Builder::new()
        .name("power".into())
        .stack_size(POWER_STACK_SIZE)
        .spawn(move || orchestrator.run(sleep_rx))?;

    log::info!(
        "metronome running: BPM {}, signature {}",
        state.selected_bpm(),
        state.signature()
    );

    loop {
        thread::sleep(Duration::from_secs(60));
        let dropped = reader.dropped_ticks();
        if dropped > 0 {
            log::warn!("{} encoder ticks dropped since boot", dropped);
        }
    }
}
