//! The continuity beeper.

use flukebeep_gpio::pwm::{PwmExtension, PwmPin, PwmPolarity};
use flukebeep_gpio::GpioResult;
use log::{debug, info};
use std::fmt::Debug;

/// Default tone of the beeper.
pub const DEFAULT_FREQUENCY_HZ: u32 = 1000;

pub trait Buzzer: Debug {
    /// Turns the tone on or off. Setting the current state again is a no-op.
    fn set_buzzer(&mut self, enabled: bool) -> GpioResult<()>;
}

/// A piezo driven from PWM channels in push-pull.
///
/// Channels alternate between normal and inversed polarity, so with two channels
/// one piezo lead is high whenever the other one is low.
#[derive(Debug)]
pub struct PwmBuzzer {
    pins: Vec<Box<dyn PwmPin>>,
    enabled: bool,
}

impl PwmBuzzer {
    /// Configures every channel for a square wave at `frequency_hz`, left disabled.
    pub fn new(mut pins: Vec<Box<dyn PwmPin>>, frequency_hz: u32) -> GpioResult<Self> {
        for (index, pin) in pins.iter_mut().enumerate() {
            let pin = pin.as_mut();
            pin.disable()?;
            pin.set_tone(frequency_hz, 0.5)?;
            pin.set_polarity(PwmPolarity::alternating(index))?;
        }
        debug!("Buzzer ready on {} channel(s) at {} Hz", pins.len(), frequency_hz);
        Ok(PwmBuzzer { pins, enabled: false })
    }
}

impl Buzzer for PwmBuzzer {
    fn set_buzzer(&mut self, enabled: bool) -> GpioResult<()> {
        if enabled == self.enabled {
            return Ok(());
        }
        for pin in self.pins.iter_mut() {
            if enabled {
                pin.enable()?;
            } else {
                pin.disable()?;
            }
        }
        self.enabled = enabled;
        Ok(())
    }
}

impl Drop for PwmBuzzer {
    fn drop(&mut self) {
        let _ = self.set_buzzer(false);
    }
}

/// Logs instead of beeping; for replay runs and machines without PWM.
#[derive(Debug, Default)]
pub struct SilentBuzzer {
    enabled: bool,
}

impl SilentBuzzer {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl Buzzer for SilentBuzzer {
    fn set_buzzer(&mut self, enabled: bool) -> GpioResult<()> {
        if enabled != self.enabled {
            info!("Beep {}", if enabled { "on" } else { "off" });
            self.enabled = enabled;
        }
        Ok(())
    }
}
