use crate::bus::SystemBus;
use crate::peripherals::pio::Pio;
use crate::port::{lock_bus, BusConsole, BusPort, FaultLatch, SharedBus};
use crate::{SimResult, SimulationObserver, StopReason};
use lights_config::{BoardDescriptor, ScenarioLimits};
use lights_hal::{announce, MirrorLoop};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// What one pass of the loop did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IterationRecord {
    pub iteration: u64,
    /// Level applied to the switch pins before the iteration.
    pub switches: u32,
    /// Value the loop read and wrote back out.
    pub mirrored: u32,
    /// Level on the LED pins afterwards.
    pub leds: u32,
    /// `leds` equals `switches` truncated to both port widths.
    pub in_sync: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RunLimits {
    pub max_iterations: u64,
    pub wall_time: Option<Duration>,
}

impl From<&ScenarioLimits> for RunLimits {
    fn from(limits: &ScenarioLimits) -> Self {
        Self {
            max_iterations: limits.max_iterations,
            wall_time: limits.wall_time_ms.map(Duration::from_millis),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub iterations: u64,
    pub stop_reason: StopReason,
    pub records: Vec<IterationRecord>,
}

impl RunOutcome {
    pub fn mirror_holds(&self) -> bool {
        self.records.iter().all(|r| r.in_sync)
    }

    pub fn final_leds(&self) -> Option<u32> {
        self.records.last().map(|r| r.leds)
    }
}

/// A simulated board running the mirror loop.
pub struct Simulation {
    bus: SharedBus,
    switches: String,
    leds: String,
    mirror: MirrorLoop<BusPort, BusPort>,
    console: Option<BusConsole>,
    console_sink: Arc<Mutex<Vec<u8>>>,
    faults: FaultLatch,
    pub observers: Vec<Arc<dyn SimulationObserver>>,
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("switches", &self.switches)
            .field("leds", &self.leds)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Simulation {
    /// Wire the loop to the named PIOs on `bus`.
    pub fn new(
        mut bus: SystemBus,
        switches: &str,
        leds: &str,
        console: Option<&str>,
    ) -> SimResult<Self> {
        // Both roles must be PIOs.
        bus.peripheral::<Pio>(switches)?;
        bus.peripheral::<Pio>(leds)?;

        let switches_base = bus.base_of(switches)?;
        let leds_base = bus.base_of(leds)?;
        let console_base = console.map(|c| bus.base_of(c)).transpose()?;

        let console_sink = Arc::new(Mutex::new(Vec::new()));
        bus.attach_console_sink(console_sink.clone(), true);

        let bus = Arc::new(Mutex::new(bus));
        let faults = FaultLatch::default();
        let mirror = MirrorLoop::new(
            BusPort::new(bus.clone(), switches_base, faults.clone()),
            BusPort::new(bus.clone(), leds_base, faults.clone()),
        );
        let console = console_base.map(|base| BusConsole::new(bus.clone(), base, faults.clone()));

        Ok(Self {
            bus,
            switches: switches.to_string(),
            leds: leds.to_string(),
            mirror,
            console,
            console_sink,
            faults,
            observers: Vec::new(),
        })
    }

    pub fn from_board(board: &BoardDescriptor) -> anyhow::Result<Self> {
        let bus = SystemBus::from_board(board)?;
        Ok(Self::new(
            bus,
            &board.switches,
            &board.leds,
            board.console.as_deref(),
        )?)
    }

    pub fn bus(&self) -> SharedBus {
        self.bus.clone()
    }

    pub fn add_observer(&mut self, observer: Arc<dyn SimulationObserver>) {
        self.observers.push(observer);
    }

    /// Controls whether console output is echoed to stdout as well as captured.
    pub fn set_console_echo(&mut self, echo_stdout: bool) {
        lock_bus(&self.bus).attach_console_sink(self.console_sink.clone(), echo_stdout);
    }

    pub fn console_output(&self) -> String {
        let bytes = self
            .console_sink
            .lock()
            .map(|g| g.clone())
            .unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Program start: print the banner, then the loop is ready to spin.
    pub fn boot(&mut self) -> SimResult<()> {
        if let Some(console) = &mut self.console {
            if announce(console).is_err() {
                self.faults.check()?;
            }
        } else {
            tracing::warn!("Board has no console; startup banner not shown");
        }

        for observer in &self.observers {
            observer.on_boot();
        }
        Ok(())
    }

    pub fn set_switches(&self, value: u32) -> SimResult<()> {
        drive_switches(&self.bus, &self.switches, value)
    }

    pub fn leds(&self) -> SimResult<u32> {
        read_leds(&self.bus, &self.leds)
    }

    /// Bits of a mirrored value that can reach the LED pins.
    pub fn led_mask(&self) -> SimResult<u32> {
        pio_mask(&self.bus, &self.leds)
    }

    /// Bits of an applied switch level the switch PIO can see.
    pub fn switch_mask(&self) -> SimResult<u32> {
        pio_mask(&self.bus, &self.switches)
    }

    /// One pass of the loop with the switches at `switches`.
    pub fn step(&mut self, iteration: u64, switches: u32) -> SimResult<IterationRecord> {
        self.set_switches(switches)?;
        let mirrored = self.mirror.step().raw();
        self.faults.check()?;

        let leds = self.leds()?;
        // Judged against the applied level, not what the loop happened to read.
        let expected = switches & self.switch_mask()? & self.led_mask()?;
        let record = IterationRecord {
            iteration,
            switches,
            mirrored,
            leds,
            in_sync: leds == expected,
        };

        tracing::debug!(
            "Iteration {}: switches={:#04x} leds={:#04x}",
            iteration,
            switches,
            leds
        );

        for observer in &self.observers {
            observer.on_iteration(&record);
        }
        Ok(record)
    }

    /// Runs the loop until a limit is hit. `stimulus` gives the switch
    /// level for each iteration.
    pub fn run<F>(&mut self, limits: &RunLimits, mut stimulus: F) -> RunOutcome
    where
        F: FnMut(u64) -> u32,
    {
        let start = Instant::now();
        let mut records = Vec::new();
        let mut n = 0u64;

        let stop_reason = loop {
            if n >= limits.max_iterations {
                break StopReason::MaxIterations;
            }
            if let Some(limit) = limits.wall_time {
                if start.elapsed() >= limit {
                    break StopReason::WallTime;
                }
            }
            match self.step(n, stimulus(n)) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::error!("Simulation error at iteration {}: {}", n, e);
                    break StopReason::BusFault;
                }
            }
            n += 1;
        };

        for observer in &self.observers {
            observer.on_stop(stop_reason);
        }

        RunOutcome {
            iterations: n,
            stop_reason,
            records,
        }
    }

    /// Hands the loop to a dedicated thread that spins forever, yielding
    /// between iterations. The returned handle drives the switch pins.
    pub fn spawn_live(self) -> LiveMirror {
        let Simulation {
            bus,
            switches,
            leds,
            mut mirror,
            ..
        } = self;

        tracing::info!("Mirror loop running on a dedicated thread");
        let handle = std::thread::spawn(move || {
            mirror.run_with(std::thread::yield_now);
        });

        LiveMirror {
            bus,
            switches,
            leds,
            handle,
        }
    }
}

/// Mirror loop running on its own thread. It never stops; dropping this
/// detaches the thread.
#[derive(Debug)]
pub struct LiveMirror {
    bus: SharedBus,
    switches: String,
    leds: String,
    handle: JoinHandle<()>,
}

impl LiveMirror {
    pub fn set_switches(&self, value: u32) -> SimResult<()> {
        drive_switches(&self.bus, &self.switches, value)
    }

    pub fn leds(&self) -> SimResult<u32> {
        read_leds(&self.bus, &self.leds)
    }

    pub fn led_mask(&self) -> SimResult<u32> {
        pio_mask(&self.bus, &self.leds)
    }

    pub fn switch_mask(&self) -> SimResult<u32> {
        pio_mask(&self.bus, &self.switches)
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Polls the LEDs until they show `expected` or `timeout` passes.
    pub fn wait_for_leds(&self, expected: u32, timeout: Duration) -> SimResult<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.leds()? == expected {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            std::thread::yield_now();
        }
    }
}

fn drive_switches(bus: &SharedBus, name: &str, value: u32) -> SimResult<()> {
    lock_bus(bus).peripheral_mut::<Pio>(name)?.drive_inputs(value);
    Ok(())
}

fn read_leds(bus: &SharedBus, name: &str) -> SimResult<u32> {
    Ok(lock_bus(bus).peripheral::<Pio>(name)?.outputs())
}

fn pio_mask(bus: &SharedBus, name: &str) -> SimResult<u32> {
    Ok(lock_bus(bus).peripheral::<Pio>(name)?.mask())
}
