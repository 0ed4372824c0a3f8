//! Debounce-layer flows: quadrature classification, burst collapse, and the
//! two switch gestures, driven through hand-fired alarms.

mod common;

use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::{FakeClock, ManualAlarm};
use takt_core::host::{HostAlarm, SystemClock};
use takt_core::settings::TICK_QUEUE_DEPTH;
use takt_core::{EncoderAlarms, EncoderReader, Tick, TickAction, TickQueue};

struct Alarms {
    a: ManualAlarm,
    b: ManualAlarm,
    sw: ManualAlarm,
    longpress: ManualAlarm,
}

fn reader() -> (
    Arc<EncoderReader<ManualAlarm, FakeClock>>,
    Alarms,
    Receiver<Tick>,
    FakeClock,
) {
    let clock = FakeClock::default();
    let (queue, rx) = TickQueue::bounded(TICK_QUEUE_DEPTH);
    let reader = Arc::new(EncoderReader::new(clock.clone(), queue));
    let alarms = Alarms {
        a: ManualAlarm::default(),
        b: ManualAlarm::default(),
        sw: ManualAlarm::default(),
        longpress: ManualAlarm::default(),
    };
    reader
        .attach_alarms(EncoderAlarms {
            pin_a: alarms.a.clone(),
            pin_b: alarms.b.clone(),
            sw_debounce: alarms.sw.clone(),
            sw_longpress: alarms.longpress.clone(),
        })
        .unwrap();
    (reader, alarms, rx, clock)
}

fn actions(rx: &Receiver<Tick>) -> Vec<TickAction> {
    rx.try_iter().map(|tick| tick.action).collect()
}

#[test]
fn b_high_then_a_falling_rotates_right() {
    let (reader, alarms, rx, _clock) = reader();
    reader.on_b_edge(true);
    assert!(alarms.b.expire());
    reader.b_debounce_elapsed();

    reader.on_a_edge();
    assert!(alarms.a.expire());
    reader.a_debounce_elapsed(true);

    assert_eq!(actions(&rx), vec![TickAction::RotateRight]);
}

#[test]
fn b_low_then_a_falling_rotates_left() {
    let (reader, alarms, rx, _clock) = reader();
    reader.on_b_edge(false);
    assert!(alarms.b.expire());
    reader.b_debounce_elapsed();

    reader.on_a_edge();
    assert!(alarms.a.expire());
    reader.a_debounce_elapsed(true);

    assert_eq!(actions(&rx), vec![TickAction::RotateLeft]);
}

#[test]
fn a_back_high_at_expiry_is_noise() {
    let (reader, alarms, rx, _clock) = reader();
    reader.on_a_edge();
    assert!(alarms.a.expire());
    reader.a_debounce_elapsed(false);
    assert!(actions(&rx).is_empty());
}

#[test]
fn b_latches_only_after_its_own_debounce() {
    let (reader, alarms, rx, _clock) = reader();
    // B went high but its debounce has not settled yet.
    reader.on_b_edge(true);

    reader.on_a_edge();
    assert!(alarms.a.expire());
    reader.a_debounce_elapsed(true);

    // The classification saw the old latched level (low).
    assert_eq!(actions(&rx), vec![TickAction::RotateLeft]);

    assert!(alarms.b.expire());
    reader.b_debounce_elapsed();
    reader.on_a_edge();
    assert!(alarms.a.expire());
    reader.a_debounce_elapsed(true);
    assert_eq!(actions(&rx), vec![TickAction::RotateRight]);
}

#[test]
fn contact_bounce_collapses_to_one_tick() {
    let (reader, alarms, rx, _clock) = reader();
    reader.on_b_edge(true);
    assert!(alarms.b.expire());
    reader.b_debounce_elapsed();

    // A storm of edges only restarts the pending alarm.
    for _ in 0..50 {
        reader.on_a_edge();
    }
    assert_eq!(alarms.a.restart_count(), 50);
    assert!(alarms.a.expire());
    reader.a_debounce_elapsed(true);

    assert_eq!(actions(&rx), vec![TickAction::RotateRight]);
}

#[test]
fn short_press_becomes_a_select() {
    let (reader, alarms, rx, _clock) = reader();
    reader.on_sw_edge(false);
    assert!(alarms.longpress.pending().is_some());

    reader.on_sw_edge(true);
    assert!(alarms.longpress.pending().is_none());
    assert!(alarms.sw.pending().is_some());

    assert!(alarms.sw.expire());
    reader.sw_debounce_elapsed();
    assert_eq!(actions(&rx), vec![TickAction::Select]);
}

#[test]
fn held_press_requests_sleep_before_release() {
    let (reader, alarms, rx, _clock) = reader();
    reader.on_sw_edge(false);
    assert!(alarms.longpress.expire());
    reader.sw_longpress_elapsed();
    assert_eq!(actions(&rx), vec![TickAction::SleepRequest]);

    // The late release must not turn into a second gesture.
    reader.on_sw_edge(true);
    assert!(alarms.sw.pending().is_none());
}

#[test]
fn ticks_carry_the_alarm_firing_time() {
    let (reader, alarms, rx, clock) = reader();
    clock.advance(42_000);
    reader.on_sw_edge(false);
    reader.on_sw_edge(true);
    clock.advance(100_000);
    assert!(alarms.sw.expire());
    reader.sw_debounce_elapsed();

    let tick = rx.try_recv().unwrap();
    assert_eq!(tick.at_us, 142_000);
}

#[test]
fn overflow_degrades_to_counted_drops() {
    let (reader, alarms, rx, _clock) = reader();
    reader.on_b_edge(true);
    assert!(alarms.b.expire());
    reader.b_debounce_elapsed();

    for _ in 0..TICK_QUEUE_DEPTH + 2 {
        reader.on_a_edge();
        assert!(alarms.a.expire());
        reader.a_debounce_elapsed(true);
    }
    assert_eq!(reader.dropped_ticks(), 2);
    assert_eq!(actions(&rx).len(), TICK_QUEUE_DEPTH);
}

// Synthetic edge storm against the real host alarms: electrically plausible
// bounce at a few kHz must still settle into exactly one tick.
#[test]
fn high_frequency_edge_storm_yields_a_single_tick() {
    let clock = SystemClock::new();
    let (queue, rx) = TickQueue::bounded(TICK_QUEUE_DEPTH);
    let reader: Arc<EncoderReader<HostAlarm, SystemClock>> =
        Arc::new(EncoderReader::new(clock, queue));

    let a_alarm = HostAlarm::new({
        let reader = Arc::clone(&reader);
        move || reader.a_debounce_elapsed(true)
    });
    let b_alarm = HostAlarm::new({
        let reader = Arc::clone(&reader);
        move || reader.b_debounce_elapsed()
    });
    let sw_alarm = HostAlarm::new({
        let reader = Arc::clone(&reader);
        move || reader.sw_debounce_elapsed()
    });
    let longpress_alarm = HostAlarm::new({
        let reader = Arc::clone(&reader);
        move || reader.sw_longpress_elapsed()
    });
    reader
        .attach_alarms(EncoderAlarms {
            pin_a: a_alarm,
            pin_b: b_alarm,
            sw_debounce: sw_alarm,
            sw_longpress: longpress_alarm,
        })
        .unwrap();

    reader.on_b_edge(true);
    thread::sleep(Duration::from_millis(5));

    // ~5 kHz bounce for 20 ms, each edge inside the 1 ms debounce window.
    for _ in 0..100 {
        reader.on_a_edge();
        thread::sleep(Duration::from_micros(200));
    }
    thread::sleep(Duration::from_millis(20));

    assert_eq!(actions(&rx), vec![TickAction::RotateRight]);
    assert_eq!(reader.dropped_ticks(), 0);
}
