use core::fmt;
use core::ptr::{read_volatile, write_volatile};

pub const DATA: usize = 0x00;
pub const CONTROL: usize = 0x04;

/// Free slots in the transmit FIFO live in CONTROL[31:16].
pub const WSPACE_SHIFT: u32 = 16;

/// Console on an Altera JTAG UART core.
#[derive(Debug)]
pub struct JtagUart {
    base: usize,
}

impl JtagUart {
    /// # Safety
    ///
    /// `base` must be the base address of a JTAG UART core mapped on the bus.
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    fn write_space(&self) -> u32 {
        // SAFETY: `new` guarantees a mapped JTAG UART at `base`.
        let control = unsafe { read_volatile((self.base + CONTROL) as *const u32) };
        control >> WSPACE_SHIFT
    }

    /// Blocks until the FIFO has room, then queues one byte.
    pub fn put(&mut self, byte: u8) {
        while self.write_space() == 0 {
            core::hint::spin_loop();
        }
        // SAFETY: `new` guarantees a mapped JTAG UART at `base`.
        unsafe { write_volatile((self.base + DATA) as *mut u32, byte as u32) }
    }
}

impl fmt::Write for JtagUart {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            self.put(byte);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::fmt::Write;

    #[test]
    fn test_put_writes_data_register() {
        let mut regs = [0u32; 2];
        regs[1] = 64 << WSPACE_SHIFT;
        let base = regs.as_mut_ptr() as usize;

        let mut uart = unsafe { JtagUart::new(base) };
        uart.write_str("ok").unwrap();
        assert_eq!(regs[0], b'k' as u32);
    }
}
