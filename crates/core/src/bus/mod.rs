use crate::peripherals::jtag_uart::JtagUart;
use crate::peripherals::pio::{Pio, PioDirection};
use crate::{Bus, Peripheral, SimResult, SimulationError};
use anyhow::Context;
use lights_config::BoardDescriptor;
use std::sync::{Arc, Mutex};

#[derive(Debug)]
pub struct PeripheralEntry {
    pub name: String,
    pub base: u64,
    pub size: u64,
    pub dev: Box<dyn Peripheral>,
}

impl PeripheralEntry {
    fn contains(&self, addr: u64) -> bool {
        addr.checked_sub(self.base).is_some_and(|o| o < self.size)
    }
}

#[derive(Debug, Default)]
pub struct SystemBus {
    pub peripherals: Vec<PeripheralEntry>,
}

impl SystemBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_board(board: &BoardDescriptor) -> anyhow::Result<Self> {
        let mut bus = Self::new();

        for p_cfg in &board.peripherals {
            let dev: Box<dyn Peripheral> = match p_cfg.r#type.as_str() {
                "pio" => {
                    let direction = match p_cfg.config_str("direction") {
                        Some(d) => d
                            .parse::<PioDirection>()
                            .map_err(|e| anyhow::anyhow!(e))
                            .with_context(|| format!("Peripheral '{}'", p_cfg.id))?,
                        None => PioDirection::default(),
                    };
                    let width = p_cfg.config_u64("width").unwrap_or(32) as u32;
                    Box::new(Pio::new(direction, width))
                }
                "jtag_uart" => Box::new(JtagUart::new()),
                other => anyhow::bail!(
                    "Peripheral '{}': unsupported type '{}'",
                    p_cfg.id,
                    other
                ),
            };

            let size = p_cfg.window_size()?;

            tracing::debug!(
                "Mapped {} '{}' at {:#x} (+{:#x})",
                p_cfg.r#type,
                p_cfg.id,
                p_cfg.base_address,
                size
            );

            bus.add_peripheral(&p_cfg.id, p_cfg.base_address, size, dev);
        }

        Ok(bus)
    }

    pub fn add_peripheral(&mut self, name: &str, base: u64, size: u64, dev: Box<dyn Peripheral>) {
        self.peripherals.push(PeripheralEntry {
            name: name.to_string(),
            base,
            size,
            dev,
        });
    }

    pub fn base_of(&self, name: &str) -> SimResult<u64> {
        self.peripherals
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.base)
            .ok_or_else(|| SimulationError::UnknownPeripheral(name.to_string()))
    }

    /// Typed access to a named peripheral, e.g. to drive switch pins.
    pub fn peripheral_mut<T: 'static>(&mut self, name: &str) -> SimResult<&mut T> {
        let entry = self
            .peripherals
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| SimulationError::UnknownPeripheral(name.to_string()))?;
        entry
            .dev
            .as_any_mut()
            .and_then(|any| any.downcast_mut::<T>())
            .ok_or_else(|| {
                SimulationError::WrongPeripheral(name.to_string(), std::any::type_name::<T>())
            })
    }

    pub fn peripheral<T: 'static>(&self, name: &str) -> SimResult<&T> {
        let entry = self
            .peripherals
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| SimulationError::UnknownPeripheral(name.to_string()))?;
        entry
            .dev
            .as_any()
            .and_then(|any| any.downcast_ref::<T>())
            .ok_or_else(|| {
                SimulationError::WrongPeripheral(name.to_string(), std::any::type_name::<T>())
            })
    }

    /// Attach a TX capture sink to every JTAG UART on this bus.
    ///
    /// When `echo_stdout` is false, console writes will no longer be printed to stdout.
    pub fn attach_console_sink(&mut self, sink: Arc<Mutex<Vec<u8>>>, echo_stdout: bool) {
        for p in &mut self.peripherals {
            let Some(any) = p.dev.as_any_mut() else {
                continue;
            };
            let Some(uart) = any.downcast_mut::<JtagUart>() else {
                continue;
            };
            uart.set_sink(Some(sink.clone()), echo_stdout);
        }
    }
}

impl Bus for SystemBus {
    fn read_u8(&self, addr: u64) -> SimResult<u8> {
        match self.peripherals.iter().find(|p| p.contains(addr)) {
            Some(p) => p.dev.read(addr - p.base),
            None => Err(SimulationError::BusFault(addr)),
        }
    }

    fn write_u8(&mut self, addr: u64, value: u8) -> SimResult<()> {
        match self.peripherals.iter_mut().find(|p| p.contains(addr)) {
            Some(p) => p.dev.write(addr - p.base, value),
            None => Err(SimulationError::BusFault(addr)),
        }
    }
}
