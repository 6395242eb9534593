#![no_std]
#![no_main]

use lights_hal::{announce, MirrorLoop, PortMap};
use panic_halt as _;
use riscv_rt::entry;

// Base addresses from the Platform Designer system (`system.h`).
const SWITCHES_BASE: usize = 0x0008_1010;
const LEDS_BASE: usize = 0x0008_1020;
const JTAG_UART_BASE: usize = 0x0008_1030;

const PORTS: PortMap = PortMap {
    switches_base: SWITCHES_BASE,
    leds_base: LEDS_BASE,
    console_base: JTAG_UART_BASE,
};

#[entry]
fn main() -> ! {
    // SAFETY: the addresses above come from the FPGA design and nothing else
    // touches these cores.
    let mut console = unsafe { PORTS.console() };
    announce(&mut console).ok();

    let (switches, leds) = unsafe { PORTS.ports() };
    MirrorLoop::new(switches, leds).run()
}
