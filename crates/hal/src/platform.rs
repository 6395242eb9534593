use crate::pio::AvalonPio;
use crate::JtagUart;
use core::fmt;

pub const STARTUP_BANNER: &str = "Starting lights program...\n";

/// Base addresses handed over by the FPGA system description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMap {
    pub switches_base: usize,
    pub leds_base: usize,
    pub console_base: usize,
}

impl PortMap {
    /// # Safety
    ///
    /// Every address in the map must point at the matching core, and the
    /// returned handles must be the only ones driving those cores.
    pub unsafe fn ports(&self) -> (AvalonPio, AvalonPio) {
        (
            AvalonPio::new(self.switches_base),
            AvalonPio::new(self.leds_base),
        )
    }

    /// # Safety
    ///
    /// Same contract as [`PortMap::ports`] for `console_base`.
    pub unsafe fn console(&self) -> JtagUart {
        JtagUart::new(self.console_base)
    }
}

/// Emits the one-line startup diagnostic.
pub fn announce<W: fmt::Write>(console: &mut W) -> fmt::Result {
    console.write_str(STARTUP_BANNER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_announce_is_a_single_line() {
        let mut out = String::new();
        announce(&mut out).unwrap();
        assert_eq!(out, "Starting lights program...\n");
        assert_eq!(out.lines().count(), 1);
    }
}
