//! Click and indicator pins, owned by the pulse worker.

use esp_idf_svc::hal::gpio::{AnyOutputPin, Output, PinDriver};
use esp_idf_svc::sys::EspError;

use takt_core::PulseOutput;

pub struct ClickOutputs {
    click: PinDriver<'static, AnyOutputPin, Output>,
    indicator: PinDriver<'static, AnyOutputPin, Output>,
}

impl ClickOutputs {
    pub fn setup(click: AnyOutputPin, indicator: AnyOutputPin) -> Result<Self, EspError> {
        Ok(Self {
            click: PinDriver::output(click)?,
            indicator: PinDriver::output(indicator)?,
        })
    }
}

impl PulseOutput for ClickOutputs {
    fn set_click(&mut self, on: bool) {
        let res = if on {
            self.click.set_high()
        } else {
            self.click.set_low()
        };
        if let Err(err) = res {
            log::warn!("click pin write failed: {}", err);
        }
    }

    fn set_indicator(&mut self, on: bool) {
        let res = if on {
            self.indicator.set_high()
        } else {
            self.indicator.set_low()
        };
        if let Err(err) = res {
            log::warn!("indicator pin write failed: {}", err);
        }
    }
}
