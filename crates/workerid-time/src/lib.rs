//! Clock sources for lease arithmetic.
//!
//! Lease expiries are absolute Unix-second timestamps, so every allocator
//! operation needs a "now". The [`ClockSource`] trait makes that injectable:
//! [`SystemClock`] for production, [`SimulatedClock`] (behind the
//! `simulation` feature) for tests that move time explicitly instead of
//! sleeping.
//!
//! The shared allocator can bypass the local source entirely and ask its
//! backend for the time (`clock_sync`); that policy lives in the allocator,
//! not here.

#[cfg(feature = "simulation")]
use std::sync::atomic::AtomicI64;
#[cfg(feature = "simulation")]
use std::sync::atomic::Ordering;
#[cfg(feature = "simulation")]
use std::sync::Arc;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// Current Unix timestamp in seconds.
///
/// Returns 0 if the system clock is before the Unix epoch, which never
/// happens on a sanely configured host but keeps this path panic-free.
#[inline]
pub fn current_unix_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// An injectable wall-clock source.
pub trait ClockSource: Send + Sync {
    /// Current Unix timestamp in seconds.
    fn now_unix_secs(&self) -> i64;
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    #[inline]
    fn now_unix_secs(&self) -> i64 {
        current_unix_secs()
    }
}

/// Simulated clock for deterministic tests.
///
/// Cloned handles share state, so a test can hold one handle and advance
/// time while an allocator reads through another.
#[cfg(feature = "simulation")]
#[derive(Debug, Clone)]
pub struct SimulatedClock {
    now_unix_secs: Arc<AtomicI64>,
}

#[cfg(feature = "simulation")]
impl SimulatedClock {
    /// A simulated clock starting at the given Unix timestamp.
    pub fn new(initial_unix_secs: i64) -> Self {
        Self {
            now_unix_secs: Arc::new(AtomicI64::new(initial_unix_secs)),
        }
    }

    /// A simulated clock starting at the current system time.
    pub fn from_system_time() -> Self {
        Self::new(current_unix_secs())
    }

    /// Advance the clock by `delta_secs`.
    pub fn advance_secs(&self, delta_secs: i64) {
        self.now_unix_secs.fetch_add(delta_secs, Ordering::SeqCst);
    }

    /// Set the clock to an absolute timestamp.
    pub fn set_secs(&self, unix_secs: i64) {
        self.now_unix_secs.store(unix_secs, Ordering::SeqCst);
    }
}

#[cfg(feature = "simulation")]
impl Default for SimulatedClock {
    fn default() -> Self {
        Self::from_system_time()
    }
}

#[cfg(feature = "simulation")]
impl ClockSource for SimulatedClock {
    #[inline]
    fn now_unix_secs(&self) -> i64 {
        self.now_unix_secs.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_unix_secs_in_reasonable_range() {
        let now = current_unix_secs();
        // After 2020, before 2100.
        assert!(now > 1_577_836_800, "now = {now}");
        assert!(now < 4_102_444_800, "now = {now}");
    }

    #[test]
    fn system_clock_is_monotonic_enough() {
        let clock = SystemClock;
        let t1 = clock.now_unix_secs();
        let t2 = clock.now_unix_secs();
        assert!(t2 >= t1);
    }
}

#[cfg(all(test, feature = "simulation"))]
mod simulation_tests {
    use super::*;

    #[test]
    fn simulated_clock_starts_at_initial_value() {
        let clock = SimulatedClock::new(1_000_000);
        assert_eq!(clock.now_unix_secs(), 1_000_000);
    }

    #[test]
    fn simulated_clock_advances() {
        let clock = SimulatedClock::new(1_000_000);
        clock.advance_secs(90);
        assert_eq!(clock.now_unix_secs(), 1_000_090);
        clock.set_secs(5);
        assert_eq!(clock.now_unix_secs(), 5);
    }

    #[test]
    fn cloned_handles_share_state() {
        let clock = SimulatedClock::new(100);
        let other = clock.clone();
        clock.advance_secs(50);
        assert_eq!(other.now_unix_secs(), 150);
    }
}
