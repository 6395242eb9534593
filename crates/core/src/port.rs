use crate::bus::SystemBus;
use crate::{Bus, SimResult, SimulationError};
use lights_hal::jtag_uart::{CONTROL, DATA, WSPACE_SHIFT};
use lights_hal::{InputPort, OutputPort, PortValue};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

pub type SharedBus = Arc<Mutex<SystemBus>>;

pub fn lock_bus(bus: &SharedBus) -> MutexGuard<'_, SystemBus> {
    // A panic elsewhere must not take the simulated hardware down with it.
    bus.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// First bus fault seen by a port since the last [`FaultLatch::take`].
///
/// Port accesses cannot fail from the loop's point of view, so faults are
/// parked here for the runner to pick up.
#[derive(Debug, Clone, Default)]
pub struct FaultLatch(Arc<Mutex<Option<u64>>>);

impl FaultLatch {
    pub fn record(&self, addr: u64) {
        let mut slot = self.0.lock().unwrap_or_else(|p| p.into_inner());
        slot.get_or_insert(addr);
    }

    pub fn take(&self) -> Option<u64> {
        self.0.lock().unwrap_or_else(|p| p.into_inner()).take()
    }

    pub fn check(&self) -> SimResult<()> {
        match self.take() {
            Some(addr) => Err(SimulationError::BusFault(addr)),
            None => Ok(()),
        }
    }
}

/// A 32-bit register on the simulated bus, used as a mirror-loop port.
#[derive(Debug, Clone)]
pub struct BusPort {
    bus: SharedBus,
    addr: u64,
    faults: FaultLatch,
}

impl BusPort {
    pub fn new(bus: SharedBus, addr: u64, faults: FaultLatch) -> Self {
        Self { bus, addr, faults }
    }
}

impl InputPort for BusPort {
    fn read(&mut self) -> PortValue {
        match lock_bus(&self.bus).read_u32(self.addr) {
            Ok(v) => PortValue::new(v),
            Err(e) => {
                tracing::error!("Port read failed: {}", e);
                self.faults.record(self.addr);
                PortValue::ZERO
            }
        }
    }
}

impl OutputPort for BusPort {
    fn write(&mut self, value: PortValue) {
        if let Err(e) = lock_bus(&self.bus).write_u32(self.addr, value.raw()) {
            tracing::error!("Port write failed: {}", e);
            self.faults.record(self.addr);
        }
    }
}

/// JTAG UART console reached through the simulated bus, the same way the
/// firmware's `JtagUart` reaches the real one.
#[derive(Debug, Clone)]
pub struct BusConsole {
    bus: SharedBus,
    base: u64,
    faults: FaultLatch,
}

impl BusConsole {
    pub fn new(bus: SharedBus, base: u64, faults: FaultLatch) -> Self {
        Self { bus, base, faults }
    }

    fn put(&mut self, byte: u8) -> SimResult<()> {
        let mut bus = lock_bus(&self.bus);
        let control = bus.read_u32(self.base + CONTROL as u64)?;
        if control >> WSPACE_SHIFT == 0 {
            tracing::warn!("Console FIFO full, dropping {:#04x}", byte);
            return Ok(());
        }
        bus.write_u32(self.base + DATA as u64, byte as u32)
    }
}

impl fmt::Write for BusConsole {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            if let Err(e) = self.put(byte) {
                tracing::error!("Console write failed: {}", e);
                if let SimulationError::BusFault(addr) = e {
                    self.faults.record(addr);
                }
                return Err(fmt::Error);
            }
        }
        Ok(())
    }
}
