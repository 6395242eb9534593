use crate::{IterationRecord, SimulationObserver, StopReason};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

#[derive(Debug)]
pub struct MirrorMetrics {
    iteration_count: AtomicU64,
    mismatch_count: AtomicU64,
    start_time: Instant,
}

impl Default for MirrorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MirrorMetrics {
    pub fn new() -> Self {
        Self {
            iteration_count: AtomicU64::new(0),
            mismatch_count: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn get_iterations(&self) -> u64 {
        self.iteration_count.load(Ordering::SeqCst)
    }

    /// Iterations where the LEDs did not end up showing what was read.
    pub fn get_mismatches(&self) -> u64 {
        self.mismatch_count.load(Ordering::SeqCst)
    }

    pub fn get_ips(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.get_iterations() as f64 / elapsed
        } else {
            0.0
        }
    }
}

impl SimulationObserver for MirrorMetrics {
    fn on_iteration(&self, record: &IterationRecord) {
        self.iteration_count.fetch_add(1, Ordering::SeqCst);
        if !record.in_sync {
            self.mismatch_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn on_stop(&self, reason: StopReason) {
        tracing::info!(
            "Mirror stopped ({:?}) after {} iterations, {} mismatches, {:.0} it/s",
            reason,
            self.get_iterations(),
            self.get_mismatches(),
            self.get_ips()
        );
    }
}
