//! Register access and the switch-to-LED mirror loop.
//!
//! Everything here is `no_std` so the same loop runs on the soft core and
//! inside the host simulator, where the ports are substituted.
#![cfg_attr(not(test), no_std)]

pub mod jtag_uart;
pub mod mirror;
pub mod pio;
pub mod platform;
pub mod port;

pub use jtag_uart::JtagUart;
pub use mirror::MirrorLoop;
pub use pio::AvalonPio;
pub use platform::{announce, PortMap, STARTUP_BANNER};
pub use port::{InputPort, OutputPort, PortValue};
