/// A value read from or written to a port.
///
/// The switch and LED PIOs are 8 bits wide but are accessed as full bus
/// words. No masking happens here: whatever the input port returned is what
/// the output port receives, and the hardware drops undriven bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PortValue(u32);

impl PortValue {
    pub const ZERO: Self = Self(0);

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    /// The 8 bits that reach the switches and LEDs on the reference board.
    pub const fn low_byte(self) -> u8 {
        (self.0 & 0xFF) as u8
    }
}

impl From<u8> for PortValue {
    fn from(value: u8) -> Self {
        Self(value as u32)
    }
}

impl From<u32> for PortValue {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<PortValue> for u32 {
    fn from(value: PortValue) -> Self {
        value.0
    }
}

impl core::fmt::LowerHex for PortValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::LowerHex::fmt(&self.0, f)
    }
}

/// Something the loop can sample, e.g. the switch PIO.
pub trait InputPort {
    fn read(&mut self) -> PortValue;
}

/// Something the loop can drive, e.g. the LED PIO.
pub trait OutputPort {
    fn write(&mut self, value: PortValue);
}

impl<T: InputPort + ?Sized> InputPort for &mut T {
    fn read(&mut self) -> PortValue {
        (**self).read()
    }
}

impl<T: OutputPort + ?Sized> OutputPort for &mut T {
    fn write(&mut self, value: PortValue) {
        (**self).write(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_low_byte_keeps_wide_word_intact() {
        let v = PortValue::new(0x1234_56AB);
        assert_eq!(v.low_byte(), 0xAB);
        assert_eq!(v.raw(), 0x1234_56AB);
    }

    #[test]
    fn test_from_u8() {
        assert_eq!(PortValue::from(0x2Au8).raw(), 0x2A);
        assert_eq!(u32::from(PortValue::from(0xFFu8)), 0xFF);
    }

    #[test]
    fn test_hex_formatting() {
        assert_eq!(format!("{:#04x}", PortValue::from(0x2Au8)), "0x2a");
    }
}
