//! Monotonic time source used for release scheduling, deadline comparison and
//! response-time computation.
//!
//! Timestamps are microseconds from an arbitrary monotonic origin. The scheduler
//! never looks at wall-clock time; everything is expressed relative to the clock
//! handed to it at startup, which keeps the whole core drivable from tests.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

/// Microseconds since the clock origin.
pub type Micros = i64;

/// Convert a configuration `Duration` into the scheduler's microsecond scale.
pub fn duration_us(d: Duration) -> Micros {
    d.as_micros() as Micros
}

/// Source of monotonic microsecond timestamps.
pub trait Clock: Send + Sync + 'static {
    fn now_us(&self) -> Micros;
}

/// Production clock backed by [`Instant`].
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_us(&self) -> Micros {
        self.origin.elapsed().as_micros() as Micros
    }
}

/// Manually driven clock for deterministic tick tests.
///
/// Time only moves when [`ManualClock::advance`] or [`ManualClock::set`] is
/// called, so a test can run scheduler ticks at exact instants.
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_us: Micros) -> Self {
        Self {
            now: AtomicI64::new(start_us),
        }
    }

    pub fn advance(&self, delta_us: Micros) {
        self.now.fetch_add(delta_us, Ordering::Relaxed);
    }

    pub fn set(&self, now_us: Micros) {
        self.now.store(now_us, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now_us(&self) -> Micros {
        self.now.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_moves_only_when_driven() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now_us(), 1_000);
        clock.advance(500);
        assert_eq!(clock.now_us(), 1_500);
        clock.set(10_000);
        assert_eq!(clock.now_us(), 10_000);
    }

    #[test]
    fn monotonic_clock_never_goes_backwards() {
        let clock = MonotonicClock::new();
        let a = clock.now_us();
        let b = clock.now_us();
        assert!(b >= a);
    }

    #[test]
    fn duration_conversion_is_microseconds() {
        assert_eq!(duration_us(Duration::from_millis(50)), 50_000);
    }
}
