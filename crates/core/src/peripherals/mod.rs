pub mod jtag_uart;
pub mod pio;
