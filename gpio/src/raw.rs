use crate::{GpioError, GpioPort, GpioResult};
use bitvec::vec::BitVec;
use log::{debug, trace};
use memmap2::{MmapOptions, MmapRaw};
use std::fmt::{Debug, Formatter};
use std::fs::OpenOptions;
use std::sync::atomic::AtomicU8;

/// Raw access to GPIO bank 0 of the BCM283x, through the memory mapped registers.
///
/// Mapped through `/dev/gpiomem`, which exposes only the GPIO block and needs no root.
///
/// Reads go through `GPLEV0`, so all 32 lines are sampled by one bus access.
/// Driving a set of lines latches their levels in `GPSET0`/`GPCLR0` first and only then
/// switches them to outputs in `GPFSELn`, so the lines never glitch to a stale level.
pub struct RawGpioPort {
    mmap: MmapRaw,
    driven: BitVec<AtomicU8>,
}

impl RawGpioPort {
    const LINE_COUNT: usize = 32;

    const FUNCTION_INPUT: u32 = 0b000;
    const FUNCTION_OUTPUT: u32 = 0b001;

    // Word offsets of the registers used
    const GPFSEL0: usize = 0x00 / 4;
    const GPSET0: usize = 0x1c / 4;
    const GPCLR0: usize = 0x28 / 4;
    const GPLEV0: usize = 0x34 / 4;

    pub fn new_gpiomem() -> GpioResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open("/dev/gpiomem")?;

        // gpiomem maps the GPIO block itself at offset 0
        let mmap = MmapOptions::new()
            .len(4096)
            .map_raw(&file)?;

        Ok(RawGpioPort {
            mmap,
            driven: BitVec::repeat(false, Self::LINE_COUNT),
        })
    }

    fn register(&self, word_offset: usize) -> *mut u32 {
        let mmap = self.mmap.as_mut_ptr() as *mut u32;
        unsafe { mmap.add(word_offset) }
    }

    /// Sets the function of every line in `mask`, touching each `GPFSELn` register once.
    fn raw_set_functions(&self, mask: u32, function: u32) -> GpioResult<()> {
        if function > 0b111 {
            return Err(GpioError::InvalidArgument);
        }

        // 10 lines per register, 3 bits each
        for register_index in 0..Self::LINE_COUNT.div_ceil(10) {
            let mut clear = 0u32;
            let mut set = 0u32;
            for slot in 0..10 {
                let line = register_index * 10 + slot;
                if line >= Self::LINE_COUNT || mask & (1 << line) == 0 {
                    continue;
                }
                let shift = slot * 3;
                clear |= 0b111 << shift;
                set |= function << shift;
            }
            if clear == 0 {
                continue;
            }

            let register_ptr = self.register(Self::GPFSEL0 + register_index);
            let mut register_value = unsafe { register_ptr.read_volatile() };
            register_value &= !clear;
            register_value |= set;
            unsafe { register_ptr.write_volatile(register_value) };
        }

        trace!("Set line function: mask={:#010x} function={}", mask, function);

        Ok(())
    }

    fn raw_write_levels(&self, mask: u32, values: u32) {
        let high = values & mask;
        let low = !values & mask;
        if high != 0 {
            unsafe { self.register(Self::GPSET0).write_volatile(high) };
        }
        if low != 0 {
            unsafe { self.register(Self::GPCLR0).write_volatile(low) };
        }
    }

    fn mark_driven(&self, mask: u32, driven: bool) {
        for line in 0..Self::LINE_COUNT {
            if mask & (1 << line) != 0 {
                self.driven.set_aliased(line, driven);
            }
        }
    }

    /// Gets the mask of lines this port currently sources.
    pub fn driven_mask(&self) -> u32 {
        self.driven
            .iter_ones()
            .fold(0, |mask, line| mask | (1 << line))
    }
}

impl Debug for RawGpioPort {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "RawGpioPort({:?})", self.mmap.as_ptr().addr())
    }
}

impl GpioPort for RawGpioPort {
    fn read_port(&self) -> GpioResult<u32> {
        let register_ptr = self.register(Self::GPLEV0) as *const u32;
        Ok(unsafe { register_ptr.read_volatile() })
    }

    fn drive_lines(&self, mask: u32, values: u32) -> GpioResult<()> {
        self.raw_write_levels(mask, values);
        self.raw_set_functions(mask, Self::FUNCTION_OUTPUT)?;
        self.mark_driven(mask, true);
        Ok(())
    }

    fn release_lines(&self, mask: u32) -> GpioResult<()> {
        self.raw_set_functions(mask, Self::FUNCTION_INPUT)?;
        self.mark_driven(mask, false);
        Ok(())
    }
}

impl Drop for RawGpioPort {
    fn drop(&mut self) {
        let driven = self.driven_mask();
        if driven != 0 {
            debug!("Releasing driven lines {:#010x}", driven);
            _ = self.raw_set_functions(driven, Self::FUNCTION_INPUT);
        }
    }
}
