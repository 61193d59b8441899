mod driver;
mod keys;
mod scanner;

use crate::pins::LineMasks;
pub use driver::*;
pub use keys::*;
pub use scanner::*;

/// Number of keypad strobe groups (G0-G2).
pub const GROUP_COUNT: usize = 3;
/// Number of keypad return lines (RL0-RL6).
pub const COLUMN_COUNT: usize = 7;

/// A key's place in the matrix: the strobe scanning it and the return line it pulls.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct KeyPosition {
    pub group: u8,
    pub column: u8,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Transition {
    Pressed,
    Released,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct KeyEvent {
    pub position: KeyPosition,
    pub transition: Transition,
}

/// Decodes which keypad strobe is active.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StrobeLines {
    strobes: [u32; GROUP_COUNT],
    mask: u32,
}

impl StrobeLines {
    pub fn new(masks: &LineMasks) -> Self {
        let strobes = masks.keypad_strobes();
        StrobeLines {
            strobes,
            mask: strobes.iter().fold(0, |mask, strobe| mask | strobe),
        }
    }

    /// Gets the group being scanned, or `None` unless exactly one keypad strobe is high.
    pub fn decode(&self, word: u32) -> Option<u8> {
        let active = word & self.mask;
        self.strobes
            .iter()
            .position(|&strobe| strobe == active)
            .map(|group| group as u8)
    }
}

/// Converts between the active-low return lines and a 7-bit column vector, bit `n` being RL`n`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ReturnLines {
    returns: [u32; COLUMN_COUNT],
    mask: u32,
}

impl ReturnLines {
    pub fn new(masks: &LineMasks) -> Self {
        ReturnLines {
            returns: masks.returns,
            mask: masks.return_lines,
        }
    }

    /// All return lines.
    pub fn mask(&self) -> u32 {
        self.mask
    }

    /// Gets the columns pulled low in `word`.
    pub fn decode(&self, word: u32) -> u8 {
        let asserted = !word & self.mask;
        self.returns
            .iter()
            .enumerate()
            .filter(|&(_, &line)| asserted & line != 0)
            .fold(0, |vector, (column, _)| vector | (1 << column))
    }

    /// Gets the return line levels that assert the columns in `vector`.
    ///
    /// Only return line bits are set in the result; columns above RL6 are ignored.
    pub fn encode(&self, vector: u8) -> u32 {
        let asserted = self
            .returns
            .iter()
            .enumerate()
            .filter(|&(column, _)| vector & (1 << column) != 0)
            .fold(0, |word, (_, &line)| word | line);
        !asserted & self.mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pins::PinMap;

    fn masks() -> LineMasks {
        PinMap::default().masks().unwrap()
    }

    #[test]
    fn return_lines_round_trip_every_vector() {
        let lines = ReturnLines::new(&masks());
        for vector in 0..=127u8 {
            assert_eq!(lines.decode(lines.encode(vector)), vector);
        }
    }

    #[test]
    fn return_lines_are_active_low() {
        let masks = masks();
        let lines = ReturnLines::new(&masks);
        assert_eq!(lines.decode(u32::MAX), 0);
        assert_eq!(lines.decode(!masks.returns[4]), 1 << 4);
        assert_eq!(lines.encode(0), masks.return_lines);
        assert_eq!(lines.encode(1 << 2), masks.return_lines & !masks.returns[2]);
        assert_eq!(lines.encode(0xff) & !masks.return_lines, 0);
    }

    #[test]
    fn strobe_needs_exactly_one_group() {
        let masks = masks();
        let strobes = StrobeLines::new(&masks);
        assert_eq!(strobes.decode(masks.digits[0]), Some(0));
        assert_eq!(strobes.decode(masks.digits[1] | masks.segments), Some(1));
        assert_eq!(strobes.decode(masks.digits[2]), Some(2));
        assert_eq!(strobes.decode(masks.digits[3]), None);
        assert_eq!(strobes.decode(masks.digits[0] | masks.digits[1]), None);
        assert_eq!(strobes.decode(0), None);
    }
}
