use crate::port::{InputPort, OutputPort, PortValue};
use core::ptr::{read_volatile, write_volatile};

/// Word offsets of the Avalon PIO register file.
pub mod regs {
    pub const DATA: usize = 0x00;
    pub const DIRECTION: usize = 0x04;
    pub const INTERRUPTMASK: usize = 0x08;
    pub const EDGECAPTURE: usize = 0x0C;
    pub const OUTSET: usize = 0x10;
    pub const OUTCLEAR: usize = 0x14;
}

/// Handle to an Altera Avalon parallel I/O core.
///
/// Reading the port is a 32-bit volatile load of `DATA`; writing it is a
/// 32-bit volatile store to `DATA`. Direction, pin muxing and clocking are
/// set up by the FPGA design, not by software.
#[derive(Debug)]
pub struct AvalonPio {
    base: usize,
}

impl AvalonPio {
    /// # Safety
    ///
    /// `base` must be the base address of a PIO core mapped on the bus, and
    /// no other handle may drive the same core concurrently.
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    #[inline]
    fn reg(&self, offset: usize) -> *mut u32 {
        (self.base + offset) as *mut u32
    }

    #[inline]
    pub fn read_data(&self) -> u32 {
        // SAFETY: `new` guarantees a mapped PIO at `base`.
        unsafe { read_volatile(self.reg(regs::DATA)) }
    }

    #[inline]
    pub fn write_data(&mut self, value: u32) {
        // SAFETY: `new` guarantees a mapped PIO at `base`.
        unsafe { write_volatile(self.reg(regs::DATA), value) }
    }
}

impl InputPort for AvalonPio {
    #[inline]
    fn read(&mut self) -> PortValue {
        PortValue::new(self.read_data())
    }
}

impl OutputPort for AvalonPio {
    #[inline]
    fn write(&mut self, value: PortValue) {
        self.write_data(value.raw())
    }
}
