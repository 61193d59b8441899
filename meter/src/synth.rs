//! Synthesizes display frames, the way the meter would drive the bus for a given reading.
//!
//! Used to produce replay captures for bench runs without a meter, and by the tests.

use crate::pins::{LineMasks, LinePolarity};
use crate::sampler::DigitFrame;
use crate::segments::LEADING_DIGIT;
use crate::specials::{SpecialDecoder, Token};
use crate::DIGIT_COUNT;

/// Gets the segment lines lit for `value` at `position`, in logical (active-high) form.
///
/// The leading digit can only show `0` and `1`; its minus sign blanks PB.
/// Anything else is blank.
pub fn encode_digit(masks: &LineMasks, position: usize, value: u8, negative: bool) -> u32 {
    let LineMasks { pa, pb, pc, pd, pe, pf, pg, .. } = *masks;

    if position == LEADING_DIGIT {
        let sign = if negative { 0 } else { pb };
        return match value {
            0 => pc | sign,
            1 => pa | pc | sign,
            _ => 0,
        };
    }

    match value {
        0 => pa | pb | pc | pd | pe | pf,
        1 => pb | pc,
        2 => pa | pb | pd | pe | pg,
        3 => pa | pb | pc | pd | pg,
        4 => pb | pc | pf | pg,
        5 => pa | pc | pd | pf | pg,
        6 => pa | pc | pd | pe | pf | pg,
        7 => pa | pb | pc,
        8 => pa | pb | pc | pd | pe | pf | pg,
        9 => pa | pb | pc | pf | pg,
        _ => 0,
    }
}

#[derive(Copy, Clone, Debug)]
pub struct FrameBuilder {
    masks: LineMasks,
    digits: [Option<u8>; DIGIT_COUNT],
    extra: [u32; DIGIT_COUNT],
    negative: bool,
}

impl FrameBuilder {
    pub fn new(masks: LineMasks) -> Self {
        FrameBuilder {
            masks,
            digits: [None; DIGIT_COUNT],
            extra: [0; DIGIT_COUNT],
            negative: false,
        }
    }

    /// Shows `digits` on digits 1-6, with the decimal point after digit `decimal_point`.
    ///
    /// A `decimal_point` of 0 lights no point.
    ///
    /// Characters other than `0`-`9` are left blank.
    pub fn number(mut self, digits: &str, decimal_point: usize) -> Self {
        for (position, character) in (1..=6).zip(digits.chars()) {
            self.digits[position] = character.to_digit(10).map(|value| value as u8);
        }
        if decimal_point != 0 {
            self = self.decimal_point(decimal_point);
        }
        self
    }

    pub fn negative(mut self) -> Self {
        self.negative = true;
        self
    }

    pub fn decimal_point(mut self, position: usize) -> Self {
        if position < DIGIT_COUNT {
            self.extra[position] |= self.masks.decimal_point;
        }
        self
    }

    /// Lights `token`; ignored if digit `position` cannot show it.
    pub fn token(mut self, position: usize, token: Token) -> Self {
        if let Some(mask) = SpecialDecoder::new(&self.masks).mask_of(position, token) {
            self.extra[position] |= mask;
        }
        self
    }

    /// Builds the frame as seen on an all active-high board.
    pub fn build(&self) -> DigitFrame {
        self.build_with(LinePolarity::default())
    }

    /// Builds the frame as seen on a board with the given line polarity.
    pub fn build_with(&self, polarity: LinePolarity) -> DigitFrame {
        let mut frame = DigitFrame::default();
        for position in 0..DIGIT_COUNT {
            let segments = self.digits[position]
                .map(|value| encode_digit(&self.masks, position, value, self.negative))
                .unwrap_or(0);
            let word = self.masks.digits[position] | segments | self.extra[position];
            frame.0[position] = polarity.normalize(&self.masks, word);
        }
        frame
    }
}
