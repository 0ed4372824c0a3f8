//! Desktop simulator for the Takt metronome.
//!
//! Runs the complete core, debounce layer included, against the std-host
//! clock and alarms. Console lines stand in for encoder edges; log output
//! stands in for the relay click.

use std::io::{self, BufRead};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::sync_channel;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use takt_core::host::{HostAlarm, HostBeatTimer, SystemClock};
use takt_core::settings::{
    ENC_SW_LONGPRESS_US, GLYPH_STRIDE, PIN_RELEASE_POLL, PULSE_QUEUE_DEPTH, SCREEN_REFRESH_PERIOD,
    SIGNATURE_COUNT, SLEEP_QUEUE_DEPTH, TICK_QUEUE_DEPTH,
};
use takt_core::{
    glyph_indexes, BeatScheduler, EncoderAlarms, EncoderReader, Error, GestureInterpreter,
    PowerHost, PowerOrchestrator, PulseOutput, PulseQueue, PulseWorker, ScreenDimmer, TempoState,
    TickQueue,
};

const SIGNATURE_LABELS: [&str; SIGNATURE_COUNT] = ["4/4", "3/4", "6/8"];

/// Simulated pin levels, shared with the alarm callbacks.
#[derive(Default)]
struct PinLevels {
    a_low: AtomicBool,
    b_high: AtomicBool,
    sw_high: AtomicBool,
}

struct ConsoleOutput;

impl PulseOutput for ConsoleOutput {
    fn set_click(&mut self, on: bool) {
        if on {
            println!("CLICK");
        }
    }

    fn set_indicator(&mut self, on: bool) {
        if on {
            println!("  (accent)");
        }
    }
}

/// Stands in for the ESP power host: "light sleep" blocks until the next
/// simulated switch press.
struct SimPowerHost {
    beat_timer: Arc<HostBeatTimer>,
    levels: Arc<PinLevels>,
}

impl PowerHost for SimPowerHost {
    fn disable_peripherals(&mut self) -> Result<(), Error> {
        self.beat_timer.stop();
        Ok(())
    }

    fn enable_peripherals(&mut self) -> Result<(), Error> {
        self.beat_timer.start();
        Ok(())
    }

    fn arm_wake_source(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn switch_released(&self) -> bool {
        self.levels.sw_high.load(Ordering::Acquire)
    }

    fn enter_light_sleep(&mut self) {
        println!("(asleep; press the switch with 's' or 'S' to wake)");
        while self.levels.sw_high.load(Ordering::Acquire) {
            thread::sleep(PIN_RELEASE_POLL);
        }
    }
}

type SimReader = Arc<EncoderReader<HostAlarm, SystemClock>>;

fn rotate(levels: &PinLevels, reader: &SimReader, right: bool) {
    levels.b_high.store(right, Ordering::Release);
    reader.on_b_edge(right);
    thread::sleep(Duration::from_millis(3));
    levels.a_low.store(true, Ordering::Release);
    reader.on_a_edge();
    thread::sleep(Duration::from_millis(3));
    levels.a_low.store(false, Ordering::Release);
}

fn press(levels: &PinLevels, reader: &SimReader, hold: Duration) {
    levels.sw_high.store(false, Ordering::Release);
    reader.on_sw_edge(false);
    thread::sleep(hold);
    levels.sw_high.store(true, Ordering::Release);
    reader.on_sw_edge(true);
}

fn spawn_screen(state: Arc<TempoState>) {
    thread::spawn(move || {
        let mut dimmer = ScreenDimmer::new();
        let mut last: Option<(bool, [u16; 4], bool)> = None;
        loop {
            let on = state.system_on();
            let indexes = glyph_indexes(&state);
            let dim = dimmer.is_dim(state.bpm_confirmed());
            let frame = (on, indexes, dim);
            if last != Some(frame) {
                last = Some(frame);
                if !on {
                    println!("[screen] (blank)");
                } else {
                    let [sig, hundreds, tens, ones] = indexes;
                    let bpm = (hundreds / GLYPH_STRIDE) * 100
                        + (tens / GLYPH_STRIDE) * 10
                        + ones / GLYPH_STRIDE;
                    let label = SIGNATURE_LABELS[(sig / GLYPH_STRIDE) as usize];
                    println!(
                        "[screen] {} {:3} {}",
                        label,
                        bpm,
                        if dim { "(dim)" } else { "" }
                    );
                }
            }
            thread::sleep(SCREEN_REFRESH_PERIOD);
        }
    });
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let state = Arc::new(TempoState::new());
    let clock = SystemClock::new();
    let levels = Arc::new(PinLevels {
        a_low: AtomicBool::new(false),
        b_high: AtomicBool::new(false),
        sw_high: AtomicBool::new(true),
    });

    // Encoder: reader first, then the alarms that call back into it.
    let (tick_queue, tick_rx) = TickQueue::bounded(TICK_QUEUE_DEPTH);
    let reader: SimReader = Arc::new(EncoderReader::new(clock.clone(), tick_queue));
    reader.attach_alarms(EncoderAlarms {
        pin_a: HostAlarm::new({
            let reader = Arc::clone(&reader);
            let levels = Arc::clone(&levels);
            move || reader.a_debounce_elapsed(levels.a_low.load(Ordering::Acquire))
        }),
        pin_b: HostAlarm::new({
            let reader = Arc::clone(&reader);
            move || reader.b_debounce_elapsed()
        }),
        sw_debounce: HostAlarm::new({
            let reader = Arc::clone(&reader);
            move || reader.sw_debounce_elapsed()
        }),
        sw_longpress: HostAlarm::new({
            let reader = Arc::clone(&reader);
            move || reader.sw_longpress_elapsed()
        }),
    })?;

    // Beat scheduling and the workers.
    let (pulse_queue, pulse_rx) = PulseQueue::bounded(PULSE_QUEUE_DEPTH);
    let (sleep_tx, sleep_rx) = sync_channel(SLEEP_QUEUE_DEPTH);
    let scheduler = Arc::new(BeatScheduler::new(Arc::clone(&state), pulse_queue));
    let beat_timer = Arc::new(HostBeatTimer::new(scheduler, clock));

    let interpreter = GestureInterpreter::new(Arc::clone(&state), sleep_tx);
    thread::spawn(move || interpreter.run(tick_rx));

    let worker = PulseWorker::new(Arc::clone(&state), ConsoleOutput);
    thread::spawn(move || worker.run(pulse_rx));

    let orchestrator = PowerOrchestrator::new(
        Arc::clone(&state),
        SimPowerHost {
            beat_timer: Arc::clone(&beat_timer),
            levels: Arc::clone(&levels),
        },
    );
    thread::spawn(move || orchestrator.run(sleep_rx));

    spawn_screen(Arc::clone(&state));
    beat_timer.start();

    println!("Takt metronome simulator");
    println!("Commands:");
    println!("  r - rotate right (BPM up)");
    println!("  l - rotate left (BPM down)");
    println!("  s - short press (select / signature)");
    println!("  S - long press (sleep; press again to wake)");
    println!("  q - quit");

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        match line?.trim() {
            "r" => rotate(&levels, &reader, true),
            "l" => rotate(&levels, &reader, false),
            "s" => press(&levels, &reader, Duration::from_millis(200)),
            "S" => press(
                &levels,
                &reader,
                Duration::from_micros(ENC_SW_LONGPRESS_US + 200_000),
            ),
            "q" => break,
            "" => {}
            other => println!("unknown command: {:?}", other),
        }
    }
    Ok(())
}
