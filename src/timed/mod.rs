//! Cumulative timings of hot phases, enabled by the `timed` feature.
//!
//! Timers are plain `static`s: every field is an atomic, so any worker may add to them and
//! the binary reports them once the run is over.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

/// Total and worst-case wall time of a phase, and how often it ran.
#[derive(Debug)]
pub struct PhaseTimer {
    label: &'static str,
    total_ns: AtomicU64,
    worst_ns: AtomicU64,
    calls: AtomicU64,
}

impl PhaseTimer {
    pub const fn new(label: &'static str) -> Self {
        Self {
            label,
            total_ns: AtomicU64::new(0),
            worst_ns: AtomicU64::new(0),
            calls: AtomicU64::new(0),
        }
    }

    /// Time `phase` and add it to the totals.
    pub fn measure<T>(&self, phase: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let output = phase();
        self.record(start.elapsed());
        output
    }

    /// Add one call lasting `elapsed`.
    pub fn record(&self, elapsed: Duration) {
        let ns = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);

        self.total_ns.fetch_add(ns, Ordering::Relaxed);
        self.worst_ns.fetch_max(ns, Ordering::Relaxed);
        self.calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> Duration {
        Duration::from_nanos(self.total_ns.load(Ordering::Relaxed))
    }

    pub fn worst(&self) -> Duration {
        Duration::from_nanos(self.worst_ns.load(Ordering::Relaxed))
    }

    /// Log the totals at `info` level; silent if the phase never ran.
    pub fn report(&self) {
        if self.calls() == 0 {
            return;
        }

        log::info!(
            "{}: {} calls in {:?}, slowest {:?}.",
            self.label,
            self.calls(),
            self.total(),
            self.worst()
        );
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn measure_returns_output() {
        let timer = PhaseTimer::new("test");

        let sum = timer.measure(|| (1..=10).sum::<u32>());

        assert_eq!(sum, 55);
        assert_eq!(timer.calls(), 1);
    }

    #[test]
    fn record_keeps_worst_case() {
        let timer = PhaseTimer::new("test");
        [3, 9, 5].into_iter().for_each(|ms| timer.record(Duration::from_millis(ms)));

        assert_eq!(timer.calls(), 3);
        assert_eq!(timer.total(), Duration::from_millis(17));
        assert_eq!(timer.worst(), Duration::from_millis(9));
    }

    #[test]
    fn shared_between_threads() {
        static TIMER: PhaseTimer = PhaseTimer::new("threads");

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| TIMER.measure(|| std::thread::sleep(Duration::from_millis(5))));
            }
        });

        assert_eq!(TIMER.calls(), 4);
        assert!(TIMER.total() >= Duration::from_millis(20));
    }
}
