//! PWM outputs, used to drive the piezo buzzer.

mod ext;
mod sysfs;

use crate::GpioResult;
use std::fmt::Debug;
pub use ext::*;
pub use sysfs::*;

/// One PWM channel. Times are in nanoseconds.
pub trait PwmPin: Debug {
    fn set_period_ns(&mut self, period_ns: u32) -> GpioResult<()>;
    fn set_duty_ns(&mut self, duty_ns: u32) -> GpioResult<()>;
    /// Only takes effect while the channel is disabled on most chips.
    fn set_polarity(&mut self, polarity: PwmPolarity) -> GpioResult<()>;
    fn enable(&mut self) -> GpioResult<()>;
    fn disable(&mut self) -> GpioResult<()>;
}

/// Level of the output during the duty part of the period.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum PwmPolarity {
    /// High for the duty, low for the rest.
    #[default]
    Normal,
    /// Low for the duty, high for the rest.
    Inversed,
}

impl PwmPolarity {
    /// Name of the polarity in the kernel's PWM sysfs interface.
    pub fn sysfs_name(self) -> &'static str {
        match self {
            PwmPolarity::Normal => "normal",
            PwmPolarity::Inversed => "inversed",
        }
    }

    /// The polarity for channel `index` of a push-pull pair: even channels normal, odd inversed.
    pub fn alternating(index: usize) -> Self {
        if index % 2 == 0 {
            PwmPolarity::Normal
        } else {
            PwmPolarity::Inversed
        }
    }
}
