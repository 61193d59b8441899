//! Annunciator decoding.
//!
//! The meter reuses PS1-PS3 (and, on the status and unit digits, some segment lines) to light
//! the words around the digits. Which word a line lights depends on the digit being strobed.

use crate::pins::LineMasks;
use crate::DIGIT_COUNT;
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

/// An annunciator shown on the display.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Token {
    ExternalTrigger,
    Trigger,
    Test,
    Remote,
    Talk,
    Listen,
    Srq,
    RateSlow,
    RateMedium,
    RateFast,
    Over,
    Error,
    Cal,
    Auto,
    Offset,
    Milli,
    Volts,
    MilliAmps,
    Dc,
    Ac,
    Mega,
    Kilo,
    Ohms,
    FourWire,
}

impl Token {
    /// Gets the text printed on the meter's bezel for this annunciator.
    ///
    /// [Token::RateMedium] and [Token::Mega] both read `M`.
    pub fn as_str(self) -> &'static str {
        use Token::*;

        match self {
            ExternalTrigger => "EX",
            Trigger => "TRIG",
            Test => "TEST",
            Remote => "REMOTE",
            Talk => "TALK",
            Listen => "LISTEN",
            Srq => "SRQ",
            RateSlow => "S",
            RateMedium => "M",
            RateFast => "F",
            Over => "OVER",
            Error => "ERROR",
            Cal => "CAL",
            Auto => "AUTO",
            Offset => "OFFSET",
            Milli => "m",
            Volts => "V",
            MilliAmps => "mA",
            Dc => "DC",
            Ac => "AC",
            Mega => "M",
            Kilo => "k",
            Ohms => "Ω",
            FourWire => "4 WIRE",
        }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The annunciators lit during one frame.
pub type TokenSet = BTreeSet<Token>;

/// Unit strings, first match wins.
const UNIT_FORMATS: &[(&[Token], &str)] = {
    use Token::*;
    &[
        (&[Milli, Volts, Dc], "mV DC"),
        (&[Milli, Volts, Ac], "mV AC"),
        (&[Volts, Dc], "V DC"),
        (&[Volts, Ac], "V AC"),
        (&[Kilo, Ohms], "kΩ"),
        (&[Mega, Ohms], "MΩ"),
        (&[Ohms], "Ω"),
        (&[MilliAmps, Dc], "mA DC"),
        (&[MilliAmps, Ac], "mA AC"),
    ]
};

/// Gets the unit of a reading from its annunciators, like `"mV DC"` or `"kΩ"`.
///
/// Returns `None` when no known combination is lit.
pub fn format_units(tokens: &TokenSet) -> Option<&'static str> {
    UNIT_FORMATS
        .iter()
        .find(|(required, _)| required.iter().all(|token| tokens.contains(token)))
        .map(|&(_, units)| units)
}

/// Per-digit annunciator tables, built once from the pin map.
#[derive(Clone, Debug)]
pub struct SpecialDecoder {
    tables: [Vec<(u32, Token)>; DIGIT_COUNT],
}

impl SpecialDecoder {
    pub fn new(masks: &LineMasks) -> Self {
        use Token::*;

        let [ps1, ps2, ps3] = masks.specials;
        let LineMasks { pa, pb, pc, pd, decimal_point: pdp, .. } = *masks;

        SpecialDecoder {
            tables: [
                vec![
                    (pa, ExternalTrigger),
                    (pb, Trigger),
                    (pc, Test),
                    (pd, Remote),
                    (ps1, Talk),
                    (ps2, Listen),
                    (ps3, Srq),
                ],
                vec![(ps1, RateSlow), (ps2, RateMedium), (ps3, RateFast)],
                vec![(ps1, Over)],
                vec![(ps1, Error)],
                vec![(ps1, Cal)],
                vec![(ps1, Auto)],
                vec![(ps1, Offset), (ps2, Milli), (ps3, Volts)],
                vec![
                    (pa, MilliAmps),
                    (pb, Dc),
                    (pc, Ac),
                    (ps1, Mega),
                    (ps2, Kilo),
                    (ps3, Ohms),
                    (pdp, FourWire),
                ],
            ],
        }
    }

    /// Adds the annunciators lit at `position` to `tokens`.
    pub fn decode_into(&self, position: usize, word: u32, tokens: &mut TokenSet) {
        let Some(table) = self.tables.get(position) else {
            return;
        };
        tokens.extend(
            table
                .iter()
                .filter(|&&(mask, _)| word & mask == mask)
                .map(|&(_, token)| token),
        );
    }

    /// Gets the line mask that lights `token` at `position`, if that digit can show it.
    pub fn mask_of(&self, position: usize, token: Token) -> Option<u32> {
        self.tables
            .get(position)?
            .iter()
            .find(|&&(_, candidate)| candidate == token)
            .map(|&(mask, _)| mask)
    }

    /// Gets the annunciators lit at `position`.
    pub fn decode_specials(&self, position: usize, word: u32) -> TokenSet {
        let mut tokens = TokenSet::new();
        self.decode_into(position, word, &mut tokens);
        tokens
    }
}
