pub mod pwm;
pub mod raw;
pub mod replay;

use std::fmt::Debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum GpioError {
    #[error("invalid argument")]
    InvalidArgument,
    #[error("IO error: {0}")]
    Io(std::io::ErrorKind),
    #[error("no more recorded port data")]
    EndOfData,
    #[error("error: {0}")]
    Other(String),
}

impl From<std::io::Error> for GpioError {
    fn from(err: std::io::Error) -> Self {
        GpioError::Io(err.kind())
    }
}

pub type GpioResult<T> = Result<T, GpioError>;

/// Whole-bank access to a parallel GPIO port.
///
/// Bit `n` of every word is line `n` of the bank. Lines start as inputs; a line becomes
/// an output only while it is being driven through [GpioPort::drive_lines].
pub trait GpioPort: Debug {
    /// Reads the instantaneous level of every line in a single access.
    fn read_port(&self) -> GpioResult<u32>;

    /// Starts sourcing the lines in `mask` with the matching bits of `values`.
    ///
    /// Lines outside `mask` are left untouched, whatever their direction.
    fn drive_lines(&self, mask: u32, values: u32) -> GpioResult<()>;

    /// Stops sourcing the lines in `mask`, returning them to high impedance inputs.
    fn release_lines(&self, mask: u32) -> GpioResult<()>;
}

/// Specifies the active level of a GPIO line.
///
/// By default, the active level is high.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GpioActiveLevel {
    #[default] High,
    Low,
}

impl GpioActiveLevel {
    /// Converts the lines in `mask` of a port word between physical levels and logical values.
    ///
    /// Bits outside `mask` are returned as they are. Applying it twice gives back the input.
    pub fn apply(&self, word: u32, mask: u32) -> u32 {
        match self {
            GpioActiveLevel::High => word,
            GpioActiveLevel::Low => word ^ mask,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_low_inverts_only_masked_lines() {
        let level = GpioActiveLevel::Low;
        assert_eq!(level.apply(0b1010, 0b0011), 0b1001);
        assert_eq!(level.apply(level.apply(0xdead_beef, 0x00ff_00ff), 0x00ff_00ff), 0xdead_beef);
    }

    #[test]
    fn active_high_is_identity() {
        assert_eq!(GpioActiveLevel::High.apply(0x1234, 0xffff), 0x1234);
    }

    #[test]
    fn io_errors_keep_their_kind() {
        let err: GpioError = std::io::Error::from(std::io::ErrorKind::PermissionDenied).into();
        assert_eq!(err, GpioError::Io(std::io::ErrorKind::PermissionDenied));
    }
}
