//! Wall-clock access, injectable for tests.

use chrono::{Local, NaiveDateTime};

/// Source of local wall-clock time.
///
/// Crontab matching and job bookkeeping read time through this trait so tests
/// can drive them with a fake clock.
pub trait Clock: Send + Sync + 'static {
    /// Current local wall-clock time.
    fn now(&self) -> NaiveDateTime;
}

/// The system's local clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_tracks_local_time() {
        let before = Local::now().naive_local();
        let now = SystemClock.now();
        let after = Local::now().naive_local();
        assert!(before <= now && now <= after);
    }
}
