//! Environment abstraction for deterministic testing.
//!
//! Decouples protocol logic from the system clock. Production code uses
//! [`SystemEnv`], whose instants come from tokio's clock so that tests running
//! with paused time observe the same virtual clock as the timers driving them.

use std::time::Duration;

/// Abstract environment providing time.
///
/// # Safety
///
/// Implementations MUST guarantee that `now()` never goes backwards.
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    type Instant: Copy + Ord + Send + Sync + std::fmt::Debug + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic).
    ///
    /// # Invariants
    ///
    /// - Subsequent calls must return times >= previous calls.
    fn now(&self) -> Self::Instant;
}

/// Production environment backed by tokio's clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl Environment for SystemEnv {
    type Instant = tokio::time::Instant;

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_monotonic() {
        let env = SystemEnv;
        let first = env.now();
        let second = env.now();
        assert!(second >= first);
        assert!(second - first < Duration::from_secs(1));
    }
}
