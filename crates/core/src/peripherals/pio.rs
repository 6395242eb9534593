use crate::SimResult;
use lights_hal::pio::regs;
use std::any::Any;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PioDirection {
    #[default]
    Input,
    Output,
    Bidir,
}

impl FromStr for PioDirection {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let v = value.trim().to_ascii_lowercase();
        match v.as_str() {
            "input" | "in" => Ok(Self::Input),
            "output" | "out" => Ok(Self::Output),
            "bidir" | "inout" | "bidirectional" => Ok(Self::Bidir),
            _ => Err(format!(
                "unsupported PIO direction '{}'; supported: input, output, bidir",
                value
            )),
        }
    }
}

/// Altera Avalon PIO core.
///
/// Input pins are driven from the host side with [`Pio::drive_inputs`];
/// output pins are whatever the CPU last latched. Everything is truncated
/// to `width` bits, the way the synthesized core only has `width` wires.
/// Edge capture and interrupts are not modeled.
#[derive(Debug)]
pub struct Pio {
    direction: PioDirection,
    width: u32,
    pins: u32,
    data_out: u32,
    dir_reg: u32,
    irq_mask: u32,
}

impl Pio {
    pub fn new(direction: PioDirection, width: u32) -> Self {
        Self {
            direction,
            width: width.clamp(1, 32),
            pins: 0,
            data_out: 0,
            dir_reg: 0,
            irq_mask: 0,
        }
    }

    pub fn mask(&self) -> u32 {
        if self.width >= 32 {
            u32::MAX
        } else {
            (1u32 << self.width) - 1
        }
    }

    /// Sets the level of the external input pins (e.g. toggle switches).
    pub fn drive_inputs(&mut self, value: u32) {
        self.pins = value;
    }

    /// Current level of the output pins (e.g. LEDs).
    pub fn outputs(&self) -> u32 {
        match self.direction {
            PioDirection::Input => 0,
            PioDirection::Output => self.data_out,
            PioDirection::Bidir => self.data_out & self.dir_reg,
        }
    }

    fn read_reg(&self, offset: usize) -> u32 {
        let mask = self.mask();
        match offset {
            regs::DATA => match self.direction {
                PioDirection::Input => self.pins & mask,
                PioDirection::Output => self.data_out,
                PioDirection::Bidir => {
                    ((self.pins & !self.dir_reg) | (self.data_out & self.dir_reg)) & mask
                }
            },
            regs::DIRECTION => self.dir_reg,
            regs::INTERRUPTMASK => self.irq_mask,
            _ => 0,
        }
    }

    /// Register contents as seen by a partial (byte) write.
    fn latch_reg(&self, offset: usize) -> u32 {
        match offset {
            regs::DATA => self.data_out,
            _ => self.read_reg(offset),
        }
    }

    fn write_reg(&mut self, offset: usize, value: u32) {
        let mask = self.mask();
        match offset {
            regs::DATA => {
                if self.direction != PioDirection::Input {
                    self.data_out = value & mask;
                }
            }
            regs::DIRECTION => {
                if self.direction == PioDirection::Bidir {
                    self.dir_reg = value & mask;
                }
            }
            regs::INTERRUPTMASK => self.irq_mask = value & mask,
            regs::OUTSET => {
                if self.direction != PioDirection::Input {
                    self.data_out |= value & mask;
                }
            }
            regs::OUTCLEAR => {
                if self.direction != PioDirection::Input {
                    self.data_out &= !value;
                }
            }
            _ => {}
        }
    }
}

impl crate::Peripheral for Pio {
    fn read(&self, offset: u64) -> SimResult<u8> {
        let reg_offset = (offset & !3) as usize;
        let byte_offset = (offset % 4) as u32;
        let reg_val = self.read_reg(reg_offset);
        Ok(((reg_val >> (byte_offset * 8)) & 0xFF) as u8)
    }

    fn write(&mut self, offset: u64, value: u8) -> SimResult<()> {
        let reg_offset = (offset & !3) as usize;
        let byte_offset = (offset % 4) as u32;
        let shifted = (value as u32) << (byte_offset * 8);

        match reg_offset {
            // Set/clear strobes act bitwise, so each byte lane applies on its own.
            regs::OUTSET | regs::OUTCLEAR => self.write_reg(reg_offset, shifted),
            _ => {
                let mask = 0xFF << (byte_offset * 8);
                let reg_val = (self.latch_reg(reg_offset) & !mask) | shifted;
                self.write_reg(reg_offset, reg_val);
            }
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
