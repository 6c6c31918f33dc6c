use chrono::{DateTime, Utc};

/// Source of wall-clock time for view timestamps.
pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;
}

/// [`Clock`] backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl<T: Fn() -> DateTime<Utc> + Send + Sync> Clock for T {
    fn now(&self) -> DateTime<Utc> {
        self()
    }
}

/// Seconds since epoch, rounded to the nearest second.
pub(crate) fn epoch_seconds(time: DateTime<Utc>) -> i64 {
    (time.timestamp_millis() + 500).div_euclid(1000)
}
