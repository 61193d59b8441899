//! Signal-to-line assignment of the meter's display and keypad bus.
//!
//! Names follow the meter's service documentation:
//! - G0-G7 are the digit strobes, active-high. G0-G2 double as the keypad strobes.
//! - PA-PG are the segment lines, PDP the decimal point.
//! - PS1-PS3 light the annunciators, whose meaning depends on the active digit.
//! - RL0-RL6 are the keypad return lines, active-low.
//!
//! Segment, decimal point and annunciator polarity differs between board revisions,
//! see [LinePolarity].

use flukebeep_gpio::GpioActiveLevel;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of lines on the port.
pub const LINE_COUNT: u8 = 32;

/// Gets the port mask of a single line.
pub const fn bit(line: u8) -> u32 {
    1 << line
}

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum ConfigError {
    #[error("line {0} does not exist on a 32-line port")]
    LineOutOfRange(u8),
    #[error("line {0} is assigned to more than one signal")]
    DuplicateLine(u8),
}

/// Optional transceiver control between the keypad return lines and the port.
///
/// Later boards buffer RL0-RL6 through a 74LVC8T245. `direction` high passes the meter's
/// returns to the port, low lets the port drive the meter. `output_enable_n` is active-low.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct BusDirectionPins {
    pub direction: u8,
    pub output_enable_n: u8,
}

/// Port line number of every signal.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinMap {
    /// G0-G7
    pub digits: [u8; 8],
    /// PA-PG
    pub segments: [u8; 7],
    /// PDP
    pub decimal_point: u8,
    /// PS1-PS3
    pub specials: [u8; 3],
    /// RL0-RL6
    pub returns: [u8; 7],
    pub bus_direction: Option<BusDirectionPins>,
}

impl Default for PinMap {
    fn default() -> Self {
        PinMap {
            digits: [23, 24, 10, 12, 14, 5, 9, 7],
            segments: [18, 20, 16, 15, 25, 22, 17],
            decimal_point: 11,
            specials: [13, 21, 19],
            returns: [8, 6, 2, 0, 3, 1, 4],
            bus_direction: None,
        }
    }
}

impl PinMap {
    fn lines(&self) -> impl Iterator<Item = u8> + '_ {
        self.digits
            .iter()
            .chain(&self.segments)
            .chain(std::iter::once(&self.decimal_point))
            .chain(&self.specials)
            .chain(&self.returns)
            .copied()
            .chain(
                self.bus_direction
                    .iter()
                    .flat_map(|pins| [pins.direction, pins.output_enable_n]),
            )
    }

    /// Checks that every signal has its own line on the port.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = 0u32;
        for line in self.lines() {
            if line >= LINE_COUNT {
                return Err(ConfigError::LineOutOfRange(line));
            }
            if seen & bit(line) != 0 {
                return Err(ConfigError::DuplicateLine(line));
            }
            seen |= bit(line);
        }
        Ok(())
    }

    /// Validates the map and computes the port masks of every signal.
    pub fn masks(&self) -> Result<LineMasks, ConfigError> {
        self.validate()?;

        let [pa, pb, pc, pd, pe, pf, pg] = self.segments.map(bit);
        let digits = self.digits.map(bit);
        let specials = self.specials.map(bit);
        let returns = self.returns.map(bit);

        Ok(LineMasks {
            digits,
            pa,
            pb,
            pc,
            pd,
            pe,
            pf,
            pg,
            segments: pa | pb | pc | pd | pe | pf | pg,
            decimal_point: bit(self.decimal_point),
            specials,
            special_lines: specials.iter().fold(0, |mask, line| mask | line),
            returns,
            return_lines: returns.iter().fold(0, |mask, line| mask | line),
            direction: self.bus_direction.map(|pins| BusDirectionMasks {
                direction: bit(pins.direction),
                output_enable_n: bit(pins.output_enable_n),
            }),
        })
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BusDirectionMasks {
    pub direction: u32,
    pub output_enable_n: u32,
}

/// Port masks computed from a validated [PinMap].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LineMasks {
    pub digits: [u32; 8],
    pub pa: u32,
    pub pb: u32,
    pub pc: u32,
    pub pd: u32,
    pub pe: u32,
    pub pf: u32,
    pub pg: u32,
    /// All of PA-PG.
    pub segments: u32,
    pub decimal_point: u32,
    /// PS1-PS3, in order.
    pub specials: [u32; 3],
    pub special_lines: u32,
    /// RL0-RL6, in order.
    pub returns: [u32; 7],
    pub return_lines: u32,
    pub direction: Option<BusDirectionMasks>,
}

impl LineMasks {
    /// The keypad strobes G0-G2.
    pub fn keypad_strobes(&self) -> [u32; 3] {
        [self.digits[0], self.digits[1], self.digits[2]]
    }
}

/// Active level of the display lines, which differs between board revisions.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinePolarity {
    pub segments: GpioActiveLevel,
    pub decimal_point: GpioActiveLevel,
    pub specials: GpioActiveLevel,
}

impl LinePolarity {
    /// Every display line active-low.
    pub const ACTIVE_LOW: LinePolarity = LinePolarity {
        segments: GpioActiveLevel::Low,
        decimal_point: GpioActiveLevel::Low,
        specials: GpioActiveLevel::Low,
    };

    /// Converts a port snapshot so that every asserted display line reads as `1`.
    ///
    /// Strobe and keypad lines are passed through. The conversion is its own inverse.
    pub fn normalize(&self, masks: &LineMasks, snapshot: u32) -> u32 {
        let word = self.segments.apply(snapshot, masks.segments);
        let word = self.decimal_point.apply(word, masks.decimal_point);
        self.specials.apply(word, masks.special_lines)
    }
}
