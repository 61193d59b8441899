use crate::keypad::{
    KeyEvent, KeyPosition, KeyTable, MeterKey, ReturnLines, StrobeLines, Transition, COLUMN_COUNT,
    GROUP_COUNT,
};
use crate::pins::LineMasks;
use log::trace;
use std::collections::BTreeSet;

/// Tracks the keypad by listening to the meter's own scan of its key matrix.
///
/// The meter scans one group per strobe G0-G2 and reads the pressed keys of that group back
/// on RL0-RL6. The scanner keeps the last column vector seen for each group and reports
/// the difference as key events.
#[derive(Clone, Debug)]
pub struct KeypadScanner {
    strobes: StrobeLines,
    returns: ReturnLines,
    table: KeyTable,
    previous: [u8; GROUP_COUNT],
    pressed: BTreeSet<KeyPosition>,
}

impl KeypadScanner {
    pub fn new(masks: &LineMasks, table: KeyTable) -> Self {
        KeypadScanner {
            strobes: StrobeLines::new(masks),
            returns: ReturnLines::new(masks),
            table,
            previous: [0; GROUP_COUNT],
            pressed: BTreeSet::new(),
        }
    }

    /// Gets the group being scanned in `snapshot`, if exactly one keypad strobe is high.
    pub fn decode_strobe(&self, snapshot: u32) -> Option<u8> {
        self.strobes.decode(snapshot)
    }

    /// Gets the columns pulled low in `snapshot`.
    pub fn decode_columns(&self, snapshot: u32) -> u8 {
        self.returns.decode(snapshot)
    }

    /// Feeds snapshots taken during keypad strobes and returns the resulting key events.
    ///
    /// Snapshots without a single keypad strobe are skipped.
    pub fn update(&mut self, snapshots: &[u32]) -> Vec<KeyEvent> {
        let mut events = Vec::new();
        for &snapshot in snapshots {
            let Some(group) = self.decode_strobe(snapshot) else {
                trace!("No keypad strobe in {:#010x}", snapshot);
                continue;
            };
            let vector = self.decode_columns(snapshot);
            self.update_group(group, vector, &mut events);
        }
        events
    }

    fn update_group(&mut self, group: u8, vector: u8, events: &mut Vec<KeyEvent>) {
        let previous = self.previous[group as usize];
        let changed = previous ^ vector;
        if changed == 0 {
            return;
        }

        for column in 0..COLUMN_COUNT as u8 {
            let bit = 1 << column;
            if changed & bit == 0 {
                continue;
            }
            let position = KeyPosition { group, column };
            let transition = if vector & bit != 0 {
                self.pressed.insert(position);
                Transition::Pressed
            } else {
                self.pressed.remove(&position);
                Transition::Released
            };
            events.push(KeyEvent { position, transition });
        }
        self.previous[group as usize] = vector;
    }

    /// Gets the matrix positions currently held down, wired to a key or not.
    pub fn pressed(&self) -> &BTreeSet<KeyPosition> {
        &self.pressed
    }

    pub fn table(&self) -> KeyTable {
        self.table
    }

    /// Gets the key at the event's position, `None` where no key is wired.
    pub fn key_of(&self, event: &KeyEvent) -> Option<MeterKey> {
        self.table.key_at(event.position)
    }

    /// Gets the named keys currently held down, in matrix order.
    pub fn pressed_keys(&self) -> Vec<MeterKey> {
        self.pressed
            .iter()
            .filter_map(|&position| self.table.key_at(position))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pins::PinMap;

    struct Bench {
        masks: LineMasks,
        returns: ReturnLines,
        scanner: KeypadScanner,
    }

    impl Bench {
        fn new() -> Self {
            let masks = PinMap::default().masks().unwrap();
            Bench {
                returns: ReturnLines::new(&masks),
                scanner: KeypadScanner::new(&masks, KeyTable::Fluke8840A),
                masks,
            }
        }

        fn snapshot(&self, group: usize, vector: u8) -> u32 {
            self.masks.digits[group] | self.returns.encode(vector)
        }

        fn scan(&mut self, vectors: [u8; GROUP_COUNT]) -> Vec<KeyEvent> {
            let snapshots: Vec<u32> = (0..GROUP_COUNT)
                .map(|group| self.snapshot(group, vectors[group]))
                .collect();
            self.scanner.update(&snapshots)
        }
    }

    fn event(group: u8, column: u8, transition: Transition) -> KeyEvent {
        KeyEvent { position: KeyPosition { group, column }, transition }
    }

    #[test]
    fn idle_keypad_reports_nothing() {
        let mut bench = Bench::new();
        assert!(bench.scan([0, 0, 0]).is_empty());
        assert!(bench.scanner.pressed().is_empty());
    }

    #[test]
    fn press_and_release_report_one_event_each() {
        let mut bench = Bench::new();

        assert_eq!(bench.scan([0, 1 << 2, 0]), vec![event(1, 2, Transition::Pressed)]);
        assert!(bench.scan([0, 1 << 2, 0]).is_empty());
        assert_eq!(bench.scanner.pressed_keys(), vec![MeterKey::RangeDown]);

        assert_eq!(bench.scan([0, 0, 0]), vec![event(1, 2, Transition::Released)]);
        assert!(bench.scanner.pressed().is_empty());
    }

    #[test]
    fn groups_are_tracked_independently() {
        let mut bench = Bench::new();
        let events = bench.scan([0b0000_0101, 0, 0b0000_1000]);
        assert_eq!(
            events,
            vec![
                event(0, 0, Transition::Pressed),
                event(0, 2, Transition::Pressed),
                event(2, 3, Transition::Pressed),
            ]
        );

        let events = bench.scan([0b0000_0100, 0, 0b0000_1000]);
        assert_eq!(events, vec![event(0, 0, Transition::Released)]);
        assert_eq!(bench.scanner.pressed_keys(), vec![MeterKey::Ohms2Wire, MeterKey::Srq]);
    }

    #[test]
    fn unwired_positions_are_tracked_but_unnamed() {
        let mut bench = Bench::new();
        let events = bench.scan([1 << 5, 0, 0]);
        assert_eq!(events, vec![event(0, 5, Transition::Pressed)]);
        assert_eq!(bench.scanner.key_of(&events[0]), None);
        assert!(bench.scanner.pressed_keys().is_empty());
        assert_eq!(bench.scanner.pressed().len(), 1);
    }

    #[test]
    fn snapshots_without_keypad_strobe_are_skipped() {
        let mut bench = Bench::new();
        let no_strobe = bench.masks.digits[4] | bench.returns.encode(0x7f);
        let two_strobes =
            bench.masks.digits[0] | bench.masks.digits[1] | bench.returns.encode(0x7f);
        assert!(bench.scanner.update(&[no_strobe, two_strobes]).is_empty());
    }
}
