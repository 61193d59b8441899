//! Turning a captured frame into a reading, and deciding continuity from it.

use crate::pins::{LineMasks, LinePolarity};
use crate::sampler::DigitFrame;
use crate::segments::{SegmentDecoder, Sign, LEADING_DIGIT};
use crate::specials::{format_units, SpecialDecoder, Token, TokenSet};
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Default continuity threshold, in ohms.
pub const DEFAULT_THRESHOLD: f64 = 10.0;

/// Digits 1-6 carry the number; 0 and 7 only hold annunciators.
const VALUE_DIGITS: std::ops::RangeInclusive<usize> = 1..=6;

/// Annunciators that rule out a low-ohms reading.
const NO_CONTINUITY: [Token; 10] = [
    Token::Over,
    Token::Error,
    Token::Cal,
    Token::MilliAmps,
    Token::Milli,
    Token::Volts,
    Token::Dc,
    Token::Ac,
    Token::Mega,
    Token::Kilo,
];

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum FrameFault {
    #[error("decimal point lit on both digit {first} and digit {second}")]
    MultipleDecimalPoints { first: usize, second: usize },
}

/// The reading shown on the display during one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Reading {
    /// Signed value, in the unit shown by the annunciators.
    pub value: f64,
    /// Digit followed by the decimal point, `0` if none is lit.
    pub decimal_point: usize,
    pub sign: Sign,
    pub tokens: TokenSet,
}

impl Reading {
    pub fn units(&self) -> Option<&'static str> {
        format_units(&self.tokens)
    }

    pub fn has(&self, token: Token) -> bool {
        self.tokens.contains(&token)
    }
}

impl Display for Reading {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let units = self.units().unwrap_or("?");
        if self.has(Token::Over) {
            write!(f, "OVER {}", units)
        } else if self.has(Token::Error) {
            write!(f, "ERROR {}", self.value)
        } else {
            write!(f, "{:.6} {}", self.value, units)
        }
    }
}

/// Decodes whole frames, from raw port snapshots to a [Reading].
#[derive(Clone, Debug)]
pub struct ReadingAssembler {
    masks: LineMasks,
    polarity: LinePolarity,
    segments: SegmentDecoder,
    specials: SpecialDecoder,
}

impl ReadingAssembler {
    pub fn new(masks: LineMasks, polarity: LinePolarity) -> Self {
        ReadingAssembler {
            segments: SegmentDecoder::new(&masks),
            specials: SpecialDecoder::new(&masks),
            masks,
            polarity,
        }
    }

    /// Decodes a frame of raw snapshots.
    ///
    /// A frame with more than one decimal point lit is rejected, the hardware never
    /// shows that and the value could not be scaled.
    pub fn assemble(&self, frame: &DigitFrame) -> Result<Reading, FrameFault> {
        let mut tokens = TokenSet::new();
        let mut decimal_point = 0;
        let mut total: u64 = 0;
        let mut sign = Sign::Positive;

        for (position, snapshot) in frame.iter() {
            let word = self.polarity.normalize(&self.masks, snapshot);

            self.specials.decode_into(position, word, &mut tokens);

            if self.segments.has_decimal_point(position, word) {
                if decimal_point != 0 {
                    return Err(FrameFault::MultipleDecimalPoints {
                        first: decimal_point,
                        second: position,
                    });
                }
                decimal_point = position;
            }

            if position == LEADING_DIGIT {
                sign = self.segments.decode_sign(word);
            }

            if VALUE_DIGITS.contains(&position) {
                let digit = self.segments.decode_digit(position, word);
                total = total * 10 + digit.value as u64;
            }
        }

        // The point sits after digit `decimal_point`, so 6 - decimal_point digits are decimals.
        let scale = 10f64.powi(*VALUE_DIGITS.end() as i32 - decimal_point as i32);
        Ok(Reading {
            value: total as f64 / scale * sign.factor(),
            decimal_point,
            sign,
            tokens,
        })
    }
}

/// Decides whether a reading means the probes are shorted.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ContinuityEvaluator {
    /// Highest resistance still counted as continuity, in ohms.
    pub threshold: f64,
}

impl Default for ContinuityEvaluator {
    fn default() -> Self {
        ContinuityEvaluator { threshold: DEFAULT_THRESHOLD }
    }
}

impl ContinuityEvaluator {
    pub fn new(threshold: f64) -> Self {
        ContinuityEvaluator { threshold }
    }

    /// Only a plain ohms reading at or below the threshold counts.
    /// Every frame is judged on its own.
    pub fn has_continuity(&self, reading: &Reading) -> bool {
        if NO_CONTINUITY.iter().any(|token| reading.tokens.contains(token)) {
            return false;
        }
        reading.value <= self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pins::PinMap;
    use crate::synth::FrameBuilder;
    use Token::*;

    fn setup() -> (ReadingAssembler, FrameBuilder) {
        let masks = PinMap::default().masks().unwrap();
        (ReadingAssembler::new(masks, LinePolarity::default()), FrameBuilder::new(masks))
    }

    fn ohms(value: f64) -> Reading {
        Reading { value, tokens: [Ohms].into_iter().collect(), ..Default::default() }
    }

    #[test]
    fn assembles_value_with_decimal_point() {
        let (assembler, builder) = setup();
        let frame = builder.number("123456", 3).build();

        let reading = assembler.assemble(&frame).unwrap();
        assert_eq!(reading.value, 123.456);
        assert_eq!(reading.decimal_point, 3);
        assert_eq!(reading.sign, Sign::Positive);
    }

    #[test]
    fn assembles_negative_value() {
        let (assembler, builder) = setup();
        let frame = builder.negative().number("100250", 2).build();

        let reading = assembler.assemble(&frame).unwrap();
        assert_eq!(reading.value, -10.025);
        assert_eq!(reading.sign, Sign::Negative);
    }

    #[test]
    fn leading_zero_and_no_decimal_point() {
        let (assembler, builder) = setup();
        let reading = assembler.assemble(&builder.number("004711", 6).build()).unwrap();
        assert_eq!(reading.value, 4711.0);

        let reading = assembler.assemble(&builder.number("123456", 0).build()).unwrap();
        assert_eq!(reading.decimal_point, 0);
        assert_eq!(reading.value, 0.123456);
    }

    #[test]
    fn collects_tokens_from_every_digit() {
        let (assembler, builder) = setup();
        let frame = builder
            .number("000520", 4)
            .token(5, Auto)
            .token(6, Milli)
            .token(6, Volts)
            .token(7, Dc)
            .token(1, RateMedium)
            .build();

        let reading = assembler.assemble(&frame).unwrap();
        assert_eq!(reading.tokens, [Auto, Milli, Volts, Dc, RateMedium].into_iter().collect());
        assert_eq!(reading.units(), Some("mV DC"));
        assert_eq!(reading.to_string(), "5.200000 mV DC");
    }

    #[test]
    fn honors_active_low_wiring() {
        let masks = PinMap::default().masks().unwrap();
        let assembler = ReadingAssembler::new(masks, LinePolarity::ACTIVE_LOW);
        let frame = FrameBuilder::new(masks)
            .number("009870", 5)
            .token(7, Ohms)
            .build_with(LinePolarity::ACTIVE_LOW);

        let reading = assembler.assemble(&frame).unwrap();
        assert_eq!(reading.value, 987.0);
        assert_eq!(reading.tokens, [Ohms].into_iter().collect());
    }

    #[test]
    fn rejects_two_decimal_points() {
        let (assembler, builder) = setup();
        let frame = builder.number("123456", 2).decimal_point(5).build();
        assert_eq!(
            assembler.assemble(&frame),
            Err(FrameFault::MultipleDecimalPoints { first: 2, second: 5 })
        );
    }

    #[test]
    fn blank_frame_reads_zero() {
        let (assembler, builder) = setup();
        let reading = assembler.assemble(&builder.build()).unwrap();
        assert_eq!(reading.value, 0.0);
        assert!(reading.tokens.is_empty());
    }

    #[test]
    fn continuity_threshold_is_inclusive() {
        let evaluator = ContinuityEvaluator::default();
        assert!(evaluator.has_continuity(&ohms(0.0)));
        assert!(evaluator.has_continuity(&ohms(10.0)));
        assert!(!evaluator.has_continuity(&ohms(10.000001)));
        assert!(!evaluator.has_continuity(&ohms(250.0)));
    }

    #[test]
    fn excluded_tokens_veto_continuity() {
        let evaluator = ContinuityEvaluator::default();
        for token in [Over, Error, Cal, MilliAmps, Milli, Volts, Dc, Ac, Mega, Kilo] {
            let mut reading = ohms(0.5);
            reading.tokens.insert(token);
            assert!(!evaluator.has_continuity(&reading), "{:?} should veto", token);
        }

        let mut reading = ohms(0.5);
        reading.tokens.extend([Auto, RateMedium, FourWire]);
        assert!(evaluator.has_continuity(&reading));
    }

    #[test]
    fn renders_overload_and_error() {
        let mut reading = ohms(0.0);
        reading.tokens.insert(Over);
        assert_eq!(reading.to_string(), "OVER Ω");

        let reading = Reading {
            value: 3.0,
            tokens: [Error].into_iter().collect(),
            ..Default::default()
        };
        assert_eq!(reading.to_string(), "ERROR 3");
    }
}
