use crate::SimResult;
use bitflags::bitflags;
use lights_hal::jtag_uart::{CONTROL, DATA, WSPACE_SHIFT};
use std::any::Any;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Depth of the transmit FIFO in the default core configuration.
pub const FIFO_DEPTH: u32 = 64;

bitflags! {
    /// Low half of the CONTROL register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Control: u32 {
        /// Read interrupt enable.
        const RE = 1 << 0;
        /// Write interrupt enable.
        const WE = 1 << 1;
        const RI = 1 << 8;
        const WI = 1 << 9;
        /// Host activity since last cleared.
        const AC = 1 << 10;
    }
}

/// Altera JTAG UART used as the program console.
///
/// The host side drains the FIFO instantly, so `WSPACE` always reports a
/// full FIFO's worth of room. Interrupt enables are stored but never fire.
#[derive(Debug)]
pub struct JtagUart {
    control: Control,
    sink: Option<Arc<Mutex<Vec<u8>>>>,
    echo_stdout: bool,
}

impl Default for JtagUart {
    fn default() -> Self {
        Self::new()
    }
}

impl JtagUart {
    pub fn new() -> Self {
        Self {
            control: Control::empty(),
            sink: None,
            echo_stdout: true,
        }
    }

    pub fn control(&self) -> Control {
        self.control
    }

    pub fn set_sink(&mut self, sink: Option<Arc<Mutex<Vec<u8>>>>, echo_stdout: bool) {
        self.sink = sink;
        self.echo_stdout = echo_stdout;
    }

    fn push_tx(&mut self, value: u8) {
        self.control.insert(Control::AC);

        if let Some(sink) = &self.sink {
            if let Ok(mut guard) = sink.lock() {
                guard.push(value);
            }
        }

        if self.echo_stdout {
            #[allow(unused_must_use)]
            {
                print!("{}", value as char);
                io::stdout().flush();
            }
        }
    }

    fn read_reg(&self, offset: usize) -> u32 {
        match offset {
            CONTROL => (FIFO_DEPTH << WSPACE_SHIFT) | self.control.bits(),
            // RVALID clear: nothing is ever typed into the console.
            _ => 0,
        }
    }
}

impl crate::Peripheral for JtagUart {
    fn read(&self, offset: u64) -> SimResult<u8> {
        let reg_offset = (offset & !3) as usize;
        let byte_offset = (offset % 4) as u32;
        Ok(((self.read_reg(reg_offset) >> (byte_offset * 8)) & 0xFF) as u8)
    }

    fn write(&mut self, offset: u64, value: u8) -> SimResult<()> {
        let offset = offset as usize;
        match offset {
            // The character sits in DATA[7:0]; the upper lanes are ignored.
            DATA => self.push_tx(value),
            CONTROL => {
                let enables = Control::from_bits_truncate(value as u32) & (Control::RE | Control::WE);
                self.control = (self.control & Control::AC) | enables;
            }
            o if o == CONTROL + 1 => {
                // AC is bit 10, i.e. bit 2 of this lane, and write-one-to-clear.
                if value & 0x04 != 0 {
                    self.control.remove(Control::AC);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn as_any(&self) -> Option<&dyn Any> {
        Some(self)
    }

    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        Some(self)
    }
}
