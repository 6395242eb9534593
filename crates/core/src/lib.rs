pub mod bus;
pub mod metrics;
pub mod peripherals;
pub mod port;
pub mod simulation;

use std::any::Any;


pub use lights_config::StopReason;
pub use simulation::{IterationRecord, LiveMirror, RunLimits, RunOutcome, Simulation};

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("Bus fault at {0:#x}")]
    BusFault(u64),
    #[error("Peripheral '{0}' is not on the bus")]
    UnknownPeripheral(String),
    #[error("Peripheral '{0}' is not a {1}")]
    WrongPeripheral(String, &'static str),
}

pub type SimResult<T> = Result<T, SimulationError>;

/// Trait for observing the mirror loop without touching it.
pub trait SimulationObserver: std::fmt::Debug + Send + Sync {
    fn on_boot(&self) {}
    fn on_iteration(&self, _record: &IterationRecord) {}
    fn on_stop(&self, _reason: StopReason) {}
}

/// Trait representing a memory-mapped peripheral
pub trait Peripheral: std::fmt::Debug + Send {
    fn read(&self, offset: u64) -> SimResult<u8>;
    fn write(&mut self, offset: u64, value: u8) -> SimResult<()>;
    fn as_any(&self) -> Option<&dyn Any> {
        None
    }
    fn as_any_mut(&mut self) -> Option<&mut dyn Any> {
        None
    }
}

/// Trait representing the system bus
pub trait Bus {
    fn read_u8(&self, addr: u64) -> SimResult<u8>;
    fn write_u8(&mut self, addr: u64, value: u8) -> SimResult<()>;

    fn read_u32(&self, addr: u64) -> SimResult<u32> {
        let b0 = self.read_u8(addr)? as u32;
        let b1 = self.read_u8(lane(addr, 1)?)? as u32;
        let b2 = self.read_u8(lane(addr, 2)?)? as u32;
        let b3 = self.read_u8(lane(addr, 3)?)? as u32;
        // Little Endian
        Ok(b0 | (b1 << 8) | (b2 << 16) | (b3 << 24))
    }

    fn write_u32(&mut self, addr: u64, value: u32) -> SimResult<()> {
        self.write_u8(addr, (value & 0xFF) as u8)?;
        self.write_u8(lane(addr, 1)?, ((value >> 8) & 0xFF) as u8)?;
        self.write_u8(lane(addr, 2)?, ((value >> 16) & 0xFF) as u8)?;
        self.write_u8(lane(addr, 3)?, ((value >> 24) & 0xFF) as u8)?;
        Ok(())
    }
}

/// Address of byte lane `k` of the word at `addr`. A word that runs off the
/// end of the address space faults instead of wrapping.
fn lane(addr: u64, k: u64) -> SimResult<u64> {
    addr.checked_add(k).ok_or(SimulationError::BusFault(addr))
}
