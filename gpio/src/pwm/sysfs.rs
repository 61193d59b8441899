use crate::pwm::{PwmPin, PwmPolarity};
use crate::{GpioError, GpioResult};
use log::debug;
use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};

/// A PWM chip under the kernel's `/sys/class/pwm` interface.
///
/// Works with the `pwm-2chan` overlay without any register access.
pub struct SysfsPwmDriver {
    base_path: PathBuf,
}

impl SysfsPwmDriver {
    const CLASS_PATH: &'static str = "/sys/class/pwm";

    /// Opens `pwmchip<index>`.
    pub fn get_chip(index: usize) -> GpioResult<Self> {
        Self::with_base(Path::new(Self::CLASS_PATH).join(format!("pwmchip{}", index)))
    }

    /// Opens a chip directory at an arbitrary path.
    pub fn with_base(chip_path: impl Into<PathBuf>) -> GpioResult<Self> {
        let base_path = chip_path.into();
        if !base_path.exists() {
            return Err(GpioError::InvalidArgument);
        }
        Ok(SysfsPwmDriver { base_path })
    }

    /// Opens channel `index`, exporting it first if the kernel hasn't yet.
    pub fn get_pin(&self, index: usize) -> GpioResult<SysfsPwmPin> {
        let path = self.base_path.join(format!("pwm{}", index));
        if !path.exists() {
            std::fs::write(self.base_path.join("export"), index.to_string())
                .map_err(|_| GpioError::Other(format!("exporting PWM channel {} failed", index)))?;
            debug!("Exported PWM channel {} of {:?}", index, self.base_path);
        }
        if !path.exists() {
            return Err(GpioError::InvalidArgument);
        }
        Ok(SysfsPwmPin { base_path: path })
    }
}

impl Debug for SysfsPwmDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SysfsPwmDriver({:?})", self.base_path)
    }
}

pub struct SysfsPwmPin {
    base_path: PathBuf,
}

impl SysfsPwmPin {
    fn write_attribute(&self, name: &str, value: impl ToString) -> GpioResult<()> {
        std::fs::write(self.base_path.join(name), value.to_string())?;
        Ok(())
    }
}

impl Debug for SysfsPwmPin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SysfsPwmPin({:?})", self.base_path)
    }
}

impl PwmPin for SysfsPwmPin {
    fn set_period_ns(&mut self, period_ns: u32) -> GpioResult<()> {
        self.write_attribute("period", period_ns)
    }

    fn set_duty_ns(&mut self, duty_ns: u32) -> GpioResult<()> {
        self.write_attribute("duty_cycle", duty_ns)
    }

    fn set_polarity(&mut self, polarity: PwmPolarity) -> GpioResult<()> {
        self.write_attribute("polarity", polarity.sysfs_name())
    }

    fn enable(&mut self) -> GpioResult<()> {
        self.write_attribute("enable", 1)
    }

    fn disable(&mut self) -> GpioResult<()> {
        self.write_attribute("enable", 0)
    }
}
