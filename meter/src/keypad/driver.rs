use crate::keypad::{ReturnLines, StrobeLines};
use crate::pins::{BusDirectionMasks, LineMasks};
use flukebeep_gpio::{GpioPort, GpioResult};
use log::{debug, trace};
use std::fmt::{Debug, Formatter};

/// Emulates key presses by driving the keypad return lines.
///
/// The meter strobes its keypad groups itself; a key press can only be faked while the
/// group holding that key is being strobed. Every [KeypadDriver::drive] checks the live
/// strobe first and does nothing on a mismatch.
pub struct KeypadDriver<'a> {
    port: &'a dyn GpioPort,
    strobes: StrobeLines,
    returns: ReturnLines,
    direction: Option<BusDirectionMasks>,
}

impl Debug for KeypadDriver<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeypadDriver({:?}, {:?})", self.port, self.direction)
    }
}

impl<'a> KeypadDriver<'a> {
    pub fn new(port: &'a dyn GpioPort, masks: &LineMasks) -> Self {
        KeypadDriver {
            port,
            strobes: StrobeLines::new(masks),
            returns: ReturnLines::new(masks),
            direction: masks.direction,
        }
    }

    /// Hands the return lines to the meter: transceiver passing meter to port, outputs enabled.
    pub fn init(&self) -> GpioResult<()> {
        if let Some(direction) = self.direction {
            self.port.drive_lines(
                direction.direction | direction.output_enable_n,
                direction.direction,
            )?;
            debug!("Keypad transceiver set to read from the meter");
        }
        Ok(())
    }

    /// Drives `columns` (bit `n` = RL`n`) as pressed keys while `group` is being scanned.
    ///
    /// Returns `false` without touching the port when another group, or none, is strobed.
    pub fn drive(&self, group: u8, columns: u8) -> GpioResult<bool> {
        let snapshot = self.port.read_port()?;
        if self.strobes.decode(snapshot) != Some(group) {
            trace!("Not driving group {}, strobe is {:?}", group, self.strobes.decode(snapshot));
            return Ok(false);
        }

        let mut mask = self.returns.mask();
        let mut values = self.returns.encode(columns);
        if let Some(direction) = self.direction {
            // direction low: port drives the meter; output enable stays asserted (low)
            mask |= direction.direction | direction.output_enable_n;
            values &= !(direction.direction | direction.output_enable_n);
        }

        self.port.drive_lines(mask, values)?;
        trace!("Driving group {} columns {:#09b}", group, columns);
        Ok(true)
    }

    /// Stops driving the return lines and hands them back to the meter.
    pub fn release(&self) -> GpioResult<()> {
        self.port.release_lines(self.returns.mask())?;
        self.init()
    }
}
