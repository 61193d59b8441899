//! 7-segment digit decoding.
//!
//! All decoders here work on normalized snapshots (see [crate::pins::LinePolarity::normalize]),
//! where an asserted line always reads as `1`.

use crate::pins::LineMasks;
use log::trace;

/// Position of the leading digit, which can only show a signed `1` or `0`.
pub const LEADING_DIGIT: usize = 1;

/// Sign shown by the leading digit.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Sign {
    #[default]
    Positive,
    Negative,
}

impl Sign {
    pub fn factor(self) -> f64 {
        match self {
            Sign::Positive => 1.0,
            Sign::Negative => -1.0,
        }
    }
}

/// A decoded digit: its magnitude and, for the leading digit, whether the minus segment was lit.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct DecodedDigit {
    pub value: u8,
    pub negative: bool,
}

impl DecodedDigit {
    pub const fn positive(value: u8) -> Self {
        DecodedDigit { value, negative: false }
    }

    pub const fn negative(value: u8) -> Self {
        DecodedDigit { value, negative: true }
    }

    /// Gets the digit as a signed number.
    pub fn signed(self) -> i8 {
        if self.negative { -(self.value as i8) } else { self.value as i8 }
    }
}

/// Segment pattern lookup, built once from the pin map.
#[derive(Clone, Debug)]
pub struct SegmentDecoder {
    segment_mask: u32,
    decimal_point: u32,
    digits: [u32; 10],
    leading: [(u32, DecodedDigit); 4],
    sign_mask: u32,
    negative: u32,
}

impl SegmentDecoder {
    pub fn new(masks: &LineMasks) -> Self {
        let LineMasks { pa, pb, pc, pd, pe, pf, pg, .. } = *masks;

        SegmentDecoder {
            segment_mask: masks.segments,
            decimal_point: masks.decimal_point,
            digits: [
                pa | pb | pc | pd | pe | pf,
                pb | pc,
                pa | pb | pd | pe | pg,
                pa | pb | pc | pd | pg,
                pb | pc | pf | pg,
                pa | pc | pd | pf | pg,
                pa | pc | pd | pe | pf | pg,
                pa | pb | pc,
                pa | pb | pc | pd | pe | pf | pg,
                pa | pb | pc | pf | pg,
            ],
            // The leading digit wires its minus sign to PB:
            // PB lit means positive, PA lights the "1".
            leading: [
                (pa | pb | pc, DecodedDigit::positive(1)),
                (pa | pc, DecodedDigit::negative(1)),
                (pb | pc, DecodedDigit::positive(0)),
                (pc, DecodedDigit::negative(0)),
            ],
            sign_mask: pb | pc,
            negative: pc,
        }
    }

    /// Decodes the digit shown at `position`.
    ///
    /// Patterns that are not in the table (blank digits, multiplexing noise) decode to `0`.
    pub fn decode_digit(&self, position: usize, word: u32) -> DecodedDigit {
        let segments = word & self.segment_mask;

        let digit = if position == LEADING_DIGIT {
            self.leading
                .iter()
                .find(|(pattern, _)| *pattern == segments)
                .map(|&(_, digit)| digit)
        } else {
            self.digits
                .iter()
                .position(|&pattern| pattern == segments)
                .map(|value| DecodedDigit::positive(value as u8))
        };

        digit.unwrap_or_else(|| {
            trace!("Unknown segment pattern {:#010x} on digit {}", segments, position);
            DecodedDigit::default()
        })
    }

    /// Decodes the sign of the reading from the leading digit. Anything unclear is positive.
    pub fn decode_sign(&self, word: u32) -> Sign {
        if word & self.sign_mask == self.negative {
            Sign::Negative
        } else {
            Sign::Positive
        }
    }

    /// Checks whether the decimal point is lit at `position`.
    ///
    /// Only digits 1-6 carry a decimal point; the line means something else elsewhere.
    pub fn has_decimal_point(&self, position: usize, word: u32) -> bool {
        (1..=6).contains(&position) && word & self.decimal_point != 0
    }
}
