//! Light-sleep power host: stops the beat alarm and encoder interrupts,
//! arms the switch pin as the wake source, sleeps, restores.

use std::sync::Arc;

use esp_idf_svc::sys;

use takt_core::{Error, PowerHost};

use crate::alarms::platform;
use crate::beat_timer::BeatTimer;
use crate::encoder::EncoderPins;

pub struct EspPowerHost {
    pins: EncoderPins,
    beat_timer: Arc<BeatTimer>,
    wake_gpio: i32,
}

impl EspPowerHost {
    pub fn new(pins: EncoderPins, beat_timer: Arc<BeatTimer>, wake_gpio: i32) -> Self {
        Self {
            pins,
            beat_timer,
            wake_gpio,
        }
    }
}

impl PowerHost for EspPowerHost {
    fn disable_peripherals(&mut self) -> Result<(), Error> {
        self.beat_timer.stop().map_err(platform)?;
        self.pins.disable().map_err(platform)
    }

    fn enable_peripherals(&mut self) -> Result<(), Error> {
        self.pins.enable().map_err(platform)?;
        self.beat_timer.start().map_err(platform)
    }

    fn arm_wake_source(&mut self) -> Result<(), Error> {
        sys::esp!(unsafe {
            sys::gpio_wakeup_enable(self.wake_gpio, sys::gpio_int_type_t_GPIO_INTR_LOW_LEVEL)
        })
        .map_err(platform)?;
        sys::esp!(unsafe { sys::esp_sleep_enable_gpio_wakeup() }).map_err(platform)
    }

    fn switch_released(&self) -> bool {
        self.pins.switch_is_high()
    }

    fn enter_light_sleep(&mut self) {
        let err = unsafe { sys::esp_light_sleep_start() };
        if err != sys::ESP_OK {
            log::error!("light sleep returned {}", err);
        }
    }
}
