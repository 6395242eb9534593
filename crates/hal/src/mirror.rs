use crate::port::{InputPort, OutputPort, PortValue};

/// Copies the switch port onto the LED port, forever.
///
/// There is a single state: every iteration performs exactly one read of
/// `switches` followed by one write of the same value to `leds`. Nothing is
/// carried from one iteration to the next.
#[derive(Debug)]
pub struct MirrorLoop<S, L> {
    switches: S,
    leds: L,
}

impl<S: InputPort, L: OutputPort> MirrorLoop<S, L> {
    pub fn new(switches: S, leds: L) -> Self {
        Self { switches, leds }
    }

    /// One read-then-write. Returns the value that was mirrored.
    #[inline]
    pub fn step(&mut self) -> PortValue {
        let value = self.switches.read();
        self.leds.write(value);
        value
    }

    /// Busy-loops without ever yielding. This is what the firmware runs.
    pub fn run(&mut self) -> ! {
        loop {
            self.step();
        }
    }

    /// Like [`MirrorLoop::run`], but calls `idle` after every iteration.
    ///
    /// Hosted runs share the CPU with other work and pass something like
    /// `std::thread::yield_now` here.
    pub fn run_with<F: FnMut()>(&mut self, mut idle: F) -> ! {
        loop {
            self.step();
            idle();
        }
    }

    pub fn into_ports(self) -> (S, L) {
        (self.switches, self.leds)
    }
}
