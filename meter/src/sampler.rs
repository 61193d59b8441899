//! Display bus acquisition.
//!
//! The meter strobes G0-G7 in turn, each high for ~600 us of a ~4.6 ms cycle. The sampler
//! follows the strobes in order and captures the port once per digit, a short settle
//! delay after the strobe asserts.

use crate::pins::LineMasks;
use crate::DIGIT_COUNT;
use flukebeep_gpio::{GpioError, GpioPort};
use log::trace;
use std::ops::Index;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Default wait between a strobe asserting and the capture.
pub const DEFAULT_SETTLE: Duration = Duration::from_micros(200);

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SampleError {
    #[error("strobe G{digit} did not assert within {timeout:?}, is the meter connected?")]
    NoSignal { digit: usize, timeout: Duration },
    #[error("sampling stopped")]
    Stopped,
    #[error("port error: {0}")]
    Gpio(#[from] GpioError),
}

/// One port snapshot per digit, indexed by digit position.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct DigitFrame(pub [u32; DIGIT_COUNT]);

impl DigitFrame {
    pub fn iter(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.0.iter().copied().enumerate()
    }

    /// The snapshots taken while the keypad strobes G0-G2 were active.
    pub fn keypad_snapshots(&self) -> &[u32] {
        &self.0[..3]
    }
}

impl Index<usize> for DigitFrame {
    type Output = u32;

    fn index(&self, position: usize) -> &u32 {
        &self.0[position]
    }
}

pub struct DisplaySampler<'a> {
    port: &'a dyn GpioPort,
    strobes: [u32; DIGIT_COUNT],
    pub settle: Duration,
    /// Longest wait for a single strobe. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl std::fmt::Debug for DisplaySampler<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DisplaySampler({:?}, settle {:?})", self.port, self.settle)
    }
}

impl<'a> DisplaySampler<'a> {
    pub fn new(port: &'a dyn GpioPort, masks: &LineMasks) -> Self {
        DisplaySampler {
            port,
            strobes: masks.digits,
            settle: DEFAULT_SETTLE,
            timeout: None,
        }
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Spins until any line of `strobe` reads high.
    ///
    /// `digit` only labels the [SampleError::NoSignal] error.
    pub fn wait_for_strobe(
        &self,
        strobe: u32,
        digit: usize,
        stop: &AtomicBool,
    ) -> Result<(), SampleError> {
        self.wait_until(strobe, true, digit, stop)
    }

    /// Spins until every line of `strobe` reads low again.
    pub fn wait_for_strobe_end(
        &self,
        strobe: u32,
        digit: usize,
        stop: &AtomicBool,
    ) -> Result<(), SampleError> {
        self.wait_until(strobe, false, digit, stop)
    }

    fn wait_until(
        &self,
        strobe: u32,
        asserted: bool,
        digit: usize,
        stop: &AtomicBool,
    ) -> Result<(), SampleError> {
        let started = Instant::now();
        loop {
            if (self.port.read_port()? & strobe != 0) == asserted {
                return Ok(());
            }
            if stop.load(Ordering::Relaxed) {
                return Err(SampleError::Stopped);
            }
            if let Some(timeout) = self.timeout {
                if started.elapsed() >= timeout {
                    return Err(SampleError::NoSignal { digit, timeout });
                }
            }
            std::hint::spin_loop();
        }
    }

    fn settle(&self) {
        if self.settle.is_zero() {
            return;
        }
        // Spin rather than sleep, the scheduler overshoots by more than the strobe width.
        let started = Instant::now();
        while started.elapsed() < self.settle {
            std::hint::spin_loop();
        }
    }

    /// Captures one snapshot per digit, G0 to G7 in order.
    pub fn acquire_frame(&self, stop: &AtomicBool) -> Result<DigitFrame, SampleError> {
        let mut frame = DigitFrame::default();
        for (digit, &strobe) in self.strobes.iter().enumerate() {
            self.wait_for_strobe(strobe, digit, stop)?;
            self.settle();
            frame.0[digit] = self.port.read_port()?;
        }
        trace!("Frame {:08x?}", frame.0);
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pins::PinMap;
    use flukebeep_gpio::replay::ReplayPort;

    fn masks() -> LineMasks {
        PinMap::default().masks().unwrap()
    }

    #[test]
    fn captures_one_snapshot_per_strobe_in_order() {
        let masks = masks();
        let snapshots: Vec<u32> = (0..DIGIT_COUNT)
            .map(|digit| masks.digits[digit] | digit as u32)
            .collect();
        let port = ReplayPort::from_frames(snapshots.clone());
        let sampler = DisplaySampler::new(&port, &masks).with_settle(Duration::ZERO);

        let frame = sampler.acquire_frame(&AtomicBool::new(false)).unwrap();
        assert_eq!(frame.0.to_vec(), snapshots);
        assert_eq!(port.read_count(), 2 * DIGIT_COUNT);
    }

    #[test]
    fn skips_idle_reads_and_foreign_strobes() {
        let masks = masks();
        // Start mid-cycle on G5, with gaps between strobes.
        let mut snapshots = vec![
            masks.digits[5],
            masks.digits[5],
            0,
            masks.digits[6],
            masks.digits[7],
            0,
        ];
        for digit in 0..DIGIT_COUNT {
            snapshots.push(0);
            snapshots.push(masks.digits[digit] | 0x1);
            snapshots.push(masks.digits[digit] | 0x1);
        }
        let port = ReplayPort::new(snapshots);
        let sampler = DisplaySampler::new(&port, &masks).with_settle(Duration::ZERO);

        let frame = sampler.acquire_frame(&AtomicBool::new(false)).unwrap();
        for (digit, snapshot) in frame.iter() {
            assert_eq!(snapshot, masks.digits[digit] | 0x1);
        }
    }

    #[test]
    fn stop_flag_cancels_the_wait() {
        let port = ReplayPort::new(vec![0]).looping();
        let sampler = DisplaySampler::new(&port, &masks());
        assert_eq!(sampler.acquire_frame(&AtomicBool::new(true)), Err(SampleError::Stopped));
    }

    #[test]
    fn missing_strobe_times_out_as_no_signal() {
        let masks = masks();
        let port = ReplayPort::new(vec![masks.digits[0]]).looping();
        let sampler = DisplaySampler::new(&port, &masks)
            .with_settle(Duration::ZERO)
            .with_timeout(Some(Duration::from_millis(5)));

        let err = sampler.acquire_frame(&AtomicBool::new(false)).unwrap_err();
        assert_eq!(err, SampleError::NoSignal { digit: 1, timeout: Duration::from_millis(5) });
    }

    #[test]
    fn waits_for_strobe_to_drop() {
        let masks = masks();
        let port = ReplayPort::new(vec![masks.digits[3], masks.digits[3], masks.digits[4]]);
        let sampler = DisplaySampler::new(&port, &masks);

        sampler.wait_for_strobe_end(masks.digits[3], 3, &AtomicBool::new(false)).unwrap();
        assert_eq!(port.read_count(), 3);
    }

    #[test]
    fn end_of_recording_surfaces_as_port_error() {
        let masks = masks();
        let port = ReplayPort::from_frames(vec![masks.digits[0]]);
        let sampler = DisplaySampler::new(&port, &masks).with_settle(Duration::ZERO);
        assert_eq!(
            sampler.acquire_frame(&AtomicBool::new(false)),
            Err(SampleError::Gpio(GpioError::EndOfData))
        );
    }

    #[test]
    fn settle_delay_is_honored() {
        let masks = masks();
        let port = ReplayPort::from_frames(masks.digits.to_vec());
        let sampler = DisplaySampler::new(&port, &masks).with_settle(Duration::from_micros(300));

        let started = Instant::now();
        sampler.acquire_frame(&AtomicBool::new(false)).unwrap();
        assert!(started.elapsed() >= Duration::from_micros(300) * DIGIT_COUNT as u32);
    }
}
