//! SSD1306 status screen: time signature and BPM digits, dimmed while an
//! unconfirmed edit blinks, cleared while the system is off.

use std::io;
use std::sync::Arc;
use std::thread;

use embedded_graphics::mono_font::ascii::{FONT_10X20, FONT_6X13};
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::text::Text;
use esp_idf_svc::hal::i2c::I2cDriver;
use ssd1306::mode::BufferedGraphicsMode;
use ssd1306::prelude::*;
use ssd1306::{I2CDisplayInterface, Ssd1306};

use takt_core::settings::{GLYPH_STRIDE, SCREEN_REFRESH_PERIOD, SIGNATURE_COUNT};
use takt_core::{glyph_indexes, ScreenDimmer, TempoState};

const SIGNATURE_LABELS: [&str; SIGNATURE_COUNT] = ["4/4", "3/4", "6/8"];
const SCREEN_STACK_SIZE: usize = 8192;

type Display = Ssd1306<
    I2CInterface<I2cDriver<'static>>,
    DisplaySize128x32,
    BufferedGraphicsMode<DisplaySize128x32>,
>;

/// Spawn the refresh task. Display failures after startup are cosmetic and
/// only logged; the metronome keeps clicking without a screen.
pub fn spawn(i2c: I2cDriver<'static>, state: Arc<TempoState>) -> io::Result<()> {
    thread::Builder::new()
        .name("screen".into())
        .stack_size(SCREEN_STACK_SIZE)
        .spawn(move || {
            let interface = I2CDisplayInterface::new(i2c);
            let mut display = Ssd1306::new(interface, DisplaySize128x32, DisplayRotation::Rotate0)
                .into_buffered_graphics_mode();
            if let Err(err) = display.init() {
                log::error!("screen init failed: {:?}", err);
                return;
            }
            log::info!("screen task running");
            refresh_loop(&mut display, &state);
        })?;
    Ok(())
}

fn refresh_loop(display: &mut Display, state: &TempoState) {
    let mut dimmer = ScreenDimmer::new();
    let mut was_blank = false;
    loop {
        if state.system_on() {
            was_blank = false;
            draw_frame(display, state, &mut dimmer);
        } else if !was_blank {
            was_blank = true;
            display.clear_buffer();
            if let Err(err) = display.flush() {
                log::warn!("screen clear failed: {:?}", err);
            }
        }
        thread::sleep(SCREEN_REFRESH_PERIOD);
    }
}

fn draw_frame(display: &mut Display, state: &TempoState, dimmer: &mut ScreenDimmer) {
    let [sig, hundreds, tens, ones] = glyph_indexes(state);
    let label = SIGNATURE_LABELS[(sig / GLYPH_STRIDE) as usize];
    let digits =
        [hundreds, tens, ones].map(|index| char::from(b'0' + (index / GLYPH_STRIDE) as u8));
    let bpm: String = digits.iter().collect();

    let dim = dimmer.is_dim(state.bpm_confirmed());
    if let Err(err) = display.set_brightness(if dim {
        Brightness::DIMMEST
    } else {
        Brightness::BRIGHTEST
    }) {
        log::warn!("screen brightness change failed: {:?}", err);
    }

    display.clear_buffer();
    let small = MonoTextStyle::new(&FONT_6X13, BinaryColor::On);
    let large = MonoTextStyle::new(&FONT_10X20, BinaryColor::On);
    if let Err(err) = Text::new(label, Point::new(2, 21), small)
        .draw(display)
        .and_then(|_| Text::new(&bpm, Point::new(64, 24), large).draw(display))
    {
        log::warn!("screen draw failed: {:?}", err);
    }
    if let Err(err) = display.flush() {
        log::warn!("screen flush failed: {:?}", err);
    }
}
