//! Encoder wiring: input pins, ISR notifications, edge pump threads and the
//! debounce alarms feeding the core reader.
//!
//! The ISR side does nothing but post a task notification; a small pump
//! thread per pin samples the level, forwards the edge to the reader and
//! re-arms the interrupt. Debounce alarms therefore only ever run from task
//! context.

use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use esp_idf_svc::hal::delay;
use esp_idf_svc::hal::gpio::{AnyIOPin, Input, InterruptType, PinDriver, Pull};
use esp_idf_svc::hal::task::notification::Notification;
use esp_idf_svc::sys::EspError;
use esp_idf_svc::timer::{EspTimerService, Task};

use takt_core::{EncoderAlarms, EncoderReader};

use crate::alarms::{EspAlarm, EspClock};
use crate::StartupError;

pub type Reader = EncoderReader<EspAlarm, EspClock>;

type SharedPin = Arc<Mutex<PinDriver<'static, AnyIOPin, Input>>>;

const PUMP_STACK_SIZE: usize = 3072;

fn lock(pin: &SharedPin) -> MutexGuard<'_, PinDriver<'static, AnyIOPin, Input>> {
    pin.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// The three encoder inputs, shared between the pump threads and the power
/// host (which gates the interrupts around sleep).
pub struct EncoderPins {
    pin_a: SharedPin,
    pin_b: SharedPin,
    pin_sw: SharedPin,
}

impl EncoderPins {
    /// Arm the edge interrupts.
    pub fn enable(&mut self) -> Result<(), EspError> {
        lock(&self.pin_a).enable_interrupt()?;
        lock(&self.pin_b).enable_interrupt()?;
        lock(&self.pin_sw).enable_interrupt()?;
        Ok(())
    }

    /// Mask the edge interrupts, e.g. while asleep.
    pub fn disable(&mut self) -> Result<(), EspError> {
        lock(&self.pin_a).disable_interrupt()?;
        lock(&self.pin_b).disable_interrupt()?;
        lock(&self.pin_sw).disable_interrupt()?;
        Ok(())
    }

    /// Level of the (active low) push switch.
    pub fn switch_is_high(&self) -> bool {
        lock(&self.pin_sw).is_high()
    }
}

fn shared_input(pin: AnyIOPin, interrupt: InterruptType) -> Result<SharedPin, StartupError> {
    let mut driver = PinDriver::input(pin)?;
    driver.set_pull(Pull::Up)?;
    driver.set_interrupt_type(interrupt)?;
    Ok(Arc::new(Mutex::new(driver)))
}

/// Per-pin edge pump: the ISR posts a notification, the pump samples and
/// forwards the edge, then re-arms the interrupt.
fn spawn_pump<F>(name: &str, pin: SharedPin, mut on_edge: F) -> Result<(), StartupError>
where
    F: FnMut(&PinDriver<'static, AnyIOPin, Input>) + Send + 'static,
{
    let notification = Notification::new();
    let notifier = notification.notifier();
    {
        let mut driver = lock(&pin);
        // The callback runs in ISR context and must only notify.
        unsafe {
            driver.subscribe(move || {
                notifier.notify_and_yield(NonZeroU32::MIN);
            })
        }?;
    }

    thread::Builder::new()
        .name(name.into())
        .stack_size(PUMP_STACK_SIZE)
        .spawn(move || loop {
            notification.wait(delay::BLOCK);
            let mut driver = lock(&pin);
            on_edge(&driver);
            if let Err(err) = driver.enable_interrupt() {
                log::warn!("re-arming edge interrupt failed: {}", err);
            }
        })?;
    Ok(())
}

/// Wire pins, alarms and pumps to the reader. Interrupts stay masked until
/// `EncoderPins::enable`.
pub fn setup(
    service: &EspTimerService<Task>,
    reader: &Arc<Reader>,
    a: AnyIOPin,
    b: AnyIOPin,
    sw: AnyIOPin,
) -> Result<EncoderPins, StartupError> {
    let pin_a = shared_input(a, InterruptType::NegEdge)?;
    let pin_b = shared_input(b, InterruptType::AnyEdge)?;
    let pin_sw = shared_input(sw, InterruptType::AnyEdge)?;

    // Expiry callbacks sample the pin they debounce.
    reader.attach_alarms(EncoderAlarms {
        pin_a: EspAlarm::new(service, {
            let reader = Arc::clone(reader);
            let pin = Arc::clone(&pin_a);
            move || {
                let a_low = lock(&pin).is_low();
                reader.a_debounce_elapsed(a_low);
            }
        })?,
        pin_b: EspAlarm::new(service, {
            let reader = Arc::clone(reader);
            move || reader.b_debounce_elapsed()
        })?,
        sw_debounce: EspAlarm::new(service, {
            let reader = Arc::clone(reader);
            move || reader.sw_debounce_elapsed()
        })?,
        sw_longpress: EspAlarm::new(service, {
            let reader = Arc::clone(reader);
            move || reader.sw_longpress_elapsed()
        })?,
    })?;

    spawn_pump("enc-a", Arc::clone(&pin_a), {
        let reader = Arc::clone(reader);
        move |_pin| reader.on_a_edge()
    })?;
    spawn_pump("enc-b", Arc::clone(&pin_b), {
        let reader = Arc::clone(reader);
        move |pin| reader.on_b_edge(pin.is_high())
    })?;
    spawn_pump("enc-sw", Arc::clone(&pin_sw), {
        let reader = Arc::clone(reader);
        move |pin| reader.on_sw_edge(pin.is_high())
    })?;

    Ok(EncoderPins {
        pin_a,
        pin_b,
        pin_sw,
    })
}
