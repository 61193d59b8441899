use crate::keypad::{KeyPosition, COLUMN_COUNT, GROUP_COUNT};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Represents the front panel keys of the meter.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MeterKey {
    /// The `V DC` function key.
    VoltsDc,
    /// The `V AC` function key.
    VoltsAc,
    /// The 2-wire `kΩ` function key.
    Ohms2Wire,
    /// The 4-wire `kΩ` function key.
    Ohms4Wire,
    /// The `mA DC` function key.
    MilliAmpsDc,
    /// The `mA AC` function key, 8842A only.
    MilliAmpsAc,
    /// The `AUTO` range key.
    AutoRange,
    /// The up range key.
    RangeUp,
    /// The down range key.
    RangeDown,
    /// The `S` rate key.
    RateSlow,
    /// The `M` rate key.
    RateMedium,
    /// The `F` rate key.
    RateFast,
    /// The `OFFSET` key.
    Offset,
    /// The `EX TRIG` key.
    ExternalTrigger,
    /// The `TRIG` key.
    Trigger,
    /// The `LOCAL` key.
    Local,
    /// The `SRQ` key.
    Srq,
}

impl MeterKey {
    /// Gets the legend printed on the key.
    pub fn legend(self) -> &'static str {
        use MeterKey::*;

        match self {
            VoltsDc => "V DC",
            VoltsAc => "V AC",
            Ohms2Wire => "kΩ 2W",
            Ohms4Wire => "kΩ 4W",
            MilliAmpsDc => "mA DC",
            MilliAmpsAc => "mA AC",
            AutoRange => "AUTO",
            RangeUp => "▲",
            RangeDown => "▼",
            RateSlow => "S",
            RateMedium => "M",
            RateFast => "F",
            Offset => "OFFSET",
            ExternalTrigger => "EX TRIG",
            Trigger => "TRIG",
            Local => "LOCAL",
            Srq => "SRQ",
        }
    }
}

impl Display for MeterKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.legend())
    }
}

type Layout = [[Option<MeterKey>; COLUMN_COUNT]; GROUP_COUNT];

#[rustfmt::skip]
const LAYOUT_8840A: Layout = {
    use MeterKey::*;
    [
        [Some(VoltsDc), Some(VoltsAc), Some(Ohms2Wire), Some(Ohms4Wire), Some(MilliAmpsDc), None, Some(Offset)],
        [Some(AutoRange), Some(RangeUp), Some(RangeDown), Some(RateSlow), Some(RateMedium), Some(RateFast), None],
        [Some(ExternalTrigger), Some(Trigger), Some(Local), Some(Srq), None, None, None],
    ]
};

#[rustfmt::skip]
const LAYOUT_8842A: Layout = {
    use MeterKey::*;
    [
        [Some(VoltsDc), Some(VoltsAc), Some(Ohms2Wire), Some(Ohms4Wire), Some(MilliAmpsDc), Some(MilliAmpsAc), Some(Offset)],
        [Some(AutoRange), Some(RangeUp), Some(RangeDown), Some(RateSlow), Some(RateMedium), Some(RateFast), None],
        [Some(ExternalTrigger), Some(Trigger), Some(Local), Some(Srq), None, None, None],
    ]
};

/// Which meter model's key wiring to use.
///
/// The model cannot be detected from the bus; picking the wrong one only gives wrong key names.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyTable {
    #[default]
    Fluke8840A,
    Fluke8842A,
}

impl KeyTable {
    fn layout(self) -> &'static Layout {
        match self {
            KeyTable::Fluke8840A => &LAYOUT_8840A,
            KeyTable::Fluke8842A => &LAYOUT_8842A,
        }
    }

    /// Converts a matrix position to a [MeterKey]; `None` where no key is wired.
    pub fn key_at(self, position: KeyPosition) -> Option<MeterKey> {
        self.layout()
            .get(position.group as usize)?
            .get(position.column as usize)
            .copied()
            .flatten()
    }

    /// Finds the matrix position of `key`; `None` if this model lacks it.
    pub fn position_of(self, key: MeterKey) -> Option<KeyPosition> {
        self.layout().iter().enumerate().find_map(|(group, columns)| {
            columns
                .iter()
                .position(|&candidate| candidate == Some(key))
                .map(|column| KeyPosition { group: group as u8, column: column as u8 })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_and_keys_agree() {
        for table in [KeyTable::Fluke8840A, KeyTable::Fluke8842A] {
            for group in 0..GROUP_COUNT as u8 {
                for column in 0..COLUMN_COUNT as u8 {
                    let position = KeyPosition { group, column };
                    if let Some(key) = table.key_at(position) {
                        assert_eq!(table.position_of(key), Some(position));
                    }
                }
            }
        }
    }

    #[test]
    fn models_differ_in_ac_current() {
        assert_eq!(KeyTable::Fluke8840A.position_of(MeterKey::MilliAmpsAc), None);
        assert_eq!(
            KeyTable::Fluke8842A.position_of(MeterKey::MilliAmpsAc),
            Some(KeyPosition { group: 0, column: 5 })
        );
    }

    #[test]
    fn unwired_and_out_of_range_positions_have_no_key() {
        let table = KeyTable::default();
        assert_eq!(table.key_at(KeyPosition { group: 2, column: 6 }), None);
        assert_eq!(table.key_at(KeyPosition { group: 3, column: 0 }), None);
        assert_eq!(table.key_at(KeyPosition { group: 0, column: 9 }), None);
    }

    #[test]
    fn keys_use_kebab_case_names_in_config() {
        let key: MeterKey = serde_json::from_str("\"ohms2-wire\"").unwrap();
        assert_eq!(key, MeterKey::Ohms2Wire);
        assert_eq!(serde_json::to_string(&KeyTable::Fluke8842A).unwrap(), "\"fluke8842a\"");
    }
}
