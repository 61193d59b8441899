//! A [GpioPort] that plays back recorded port words instead of touching hardware.
//!
//! Used for offline runs against captures of a real meter, and as the port double in tests:
//! every write is recorded and can be inspected afterwards.

use crate::{GpioError, GpioPort, GpioResult};
use std::cell::{Cell, RefCell};
use std::fs;
use std::path::Path;

/// A write performed on a [ReplayPort].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PortWrite {
    Drive { mask: u32, values: u32 },
    Release { mask: u32 },
}

#[derive(Debug)]
pub struct ReplayPort {
    snapshots: Vec<u32>,
    hold: usize,
    looping: bool,
    reads: Cell<usize>,
    driven_mask: Cell<u32>,
    driven_values: Cell<u32>,
    writes: RefCell<Vec<PortWrite>>,
}

impl ReplayPort {
    /// Creates a port that returns each snapshot for exactly one read.
    pub fn new(snapshots: Vec<u32>) -> Self {
        ReplayPort {
            snapshots,
            hold: 1,
            looping: false,
            reads: Cell::new(0),
            driven_mask: Cell::new(0),
            driven_values: Cell::new(0),
            writes: RefCell::new(Vec::new()),
        }
    }

    /// Creates a port that returns each snapshot for two consecutive reads.
    ///
    /// This is the shape the display sampler consumes: one read sees the strobe assert,
    /// the next one captures the digit.
    pub fn from_frames(snapshots: Vec<u32>) -> Self {
        Self::new(snapshots).with_hold(2)
    }

    /// Loads a capture file: one hex word per line, `0x` prefix optional, `#` starts a comment.
    pub fn load(path: impl AsRef<Path>) -> GpioResult<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self::from_frames(parse_capture(&content)?))
    }

    pub fn with_hold(mut self, hold: usize) -> Self {
        self.hold = hold.max(1);
        self
    }

    /// Starts over at the first snapshot instead of running out of data.
    pub fn looping(mut self) -> Self {
        self.looping = true;
        self
    }

    /// Gets every write performed so far, oldest first.
    pub fn writes(&self) -> Vec<PortWrite> {
        self.writes.borrow().clone()
    }

    /// Gets the number of [PortWrite::Drive] calls performed so far.
    pub fn drive_count(&self) -> usize {
        self.writes
            .borrow()
            .iter()
            .filter(|write| matches!(write, PortWrite::Drive { .. }))
            .count()
    }

    /// Gets the number of reads performed so far.
    pub fn read_count(&self) -> usize {
        self.reads.get()
    }
}

impl GpioPort for ReplayPort {
    fn read_port(&self) -> GpioResult<u32> {
        if self.snapshots.is_empty() {
            return Err(GpioError::EndOfData);
        }

        let read = self.reads.get();
        let mut index = read / self.hold;
        if index >= self.snapshots.len() {
            if !self.looping {
                return Err(GpioError::EndOfData);
            }
            index %= self.snapshots.len();
        }
        self.reads.set(read + 1);

        let mask = self.driven_mask.get();
        Ok((self.snapshots[index] & !mask) | (self.driven_values.get() & mask))
    }

    fn drive_lines(&self, mask: u32, values: u32) -> GpioResult<()> {
        self.writes.borrow_mut().push(PortWrite::Drive { mask, values });
        self.driven_mask.set(self.driven_mask.get() | mask);
        self.driven_values
            .set((self.driven_values.get() & !mask) | (values & mask));
        Ok(())
    }

    fn release_lines(&self, mask: u32) -> GpioResult<()> {
        self.writes.borrow_mut().push(PortWrite::Release { mask });
        self.driven_mask.set(self.driven_mask.get() & !mask);
        Ok(())
    }
}

/// Parses the text capture format read by [ReplayPort::load].
pub fn parse_capture(content: &str) -> GpioResult<Vec<u32>> {
    content
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .filter(|line| !line.is_empty())
        .map(|line| {
            let digits = line
                .strip_prefix("0x")
                .or_else(|| line.strip_prefix("0X"))
                .unwrap_or(line);
            u32::from_str_radix(digits, 16)
                .map_err(|_| GpioError::Other(format!("invalid capture word {:?}", line)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holds_each_snapshot_for_configured_reads() {
        let port = ReplayPort::from_frames(vec![1, 2]);
        assert_eq!(port.read_port(), Ok(1));
        assert_eq!(port.read_port(), Ok(1));
        assert_eq!(port.read_port(), Ok(2));
        assert_eq!(port.read_port(), Ok(2));
        assert_eq!(port.read_port(), Err(GpioError::EndOfData));
        assert_eq!(port.read_count(), 4);
    }

    #[test]
    fn looping_port_never_runs_out() {
        let port = ReplayPort::new(vec![7, 8]).looping();
        let words: Vec<u32> = (0..5).map(|_| port.read_port().unwrap()).collect();
        assert_eq!(words, vec![7, 8, 7, 8, 7]);
    }

    #[test]
    fn driven_lines_override_recorded_levels() {
        let port = ReplayPort::new(vec![0b1111_0000]).looping();
        port.drive_lines(0b0011_0000, 0b0001_0000).unwrap();
        assert_eq!(port.read_port(), Ok(0b1101_0000));
        port.release_lines(0b0011_0000).unwrap();
        assert_eq!(port.read_port(), Ok(0b1111_0000));
        assert_eq!(
            port.writes(),
            vec![
                PortWrite::Drive { mask: 0b0011_0000, values: 0b0001_0000 },
                PortWrite::Release { mask: 0b0011_0000 },
            ]
        );
        assert_eq!(port.drive_count(), 1);
    }

    #[test]
    fn parses_capture_text() {
        let words = parse_capture("# frame 1\n0x00800000\n  01000000  # G1\n\nff\n").unwrap();
        assert_eq!(words, vec![0x0080_0000, 0x0100_0000, 0xff]);
        assert!(parse_capture("0xzz").is_err());
    }
}
