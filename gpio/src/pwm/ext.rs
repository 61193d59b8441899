use crate::{GpioError, GpioResult};
use crate::pwm::PwmPin;

/// Programs a channel by frequency and duty ratio instead of raw nanoseconds.
pub trait PwmExtension {
    /// Sets the period to match `frequency_hz` and the duty cycle to `ratio` of it.
    ///
    /// The duty cycle is cleared first; the kernel refuses a period shorter than the
    /// current duty cycle.
    fn set_tone(&mut self, frequency_hz: u32, ratio: f32) -> GpioResult<()>;
}

impl PwmExtension for dyn PwmPin + '_ {
    fn set_tone(&mut self, frequency_hz: u32, ratio: f32) -> GpioResult<()> {
        if frequency_hz == 0 || !(0.0..=1.0).contains(&ratio) {
            return Err(GpioError::InvalidArgument);
        }

        let period_ns = 1_000_000_000 / frequency_hz;
        self.set_duty_ns(0)?;
        self.set_period_ns(period_ns)?;
        self.set_duty_ns((period_ns as f32 * ratio) as u32)
    }
}
