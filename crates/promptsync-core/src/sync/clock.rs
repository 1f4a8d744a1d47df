//! Time sources for the sync engine

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// Source of server timestamps
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock with millisecond resolution that never repeats a value.
///
/// Incremental download filters on `updated_at > lastSync`, so a write in
/// the same millisecond as a handed-out `syncTimestamp` would be skipped
/// forever. Each call returns at least one millisecond more than the last.
#[derive(Debug, Default)]
pub struct SystemClock {
    last_millis: AtomicI64,
}

impl SystemClock {
    pub const fn new() -> Self {
        Self {
            last_millis: AtomicI64::new(i64::MIN),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        let wall = Utc::now().timestamp_millis();
        let next = |previous: i64| wall.max(previous.saturating_add(1));
        let previous = self
            .last_millis
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |previous| {
                Some(next(previous))
            })
            .unwrap_or_else(|previous| previous);
        DateTime::from_timestamp_millis(next(previous)).unwrap_or_else(Utc::now)
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub const fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }

    pub fn set(&self, to: DateTime<Utc>) {
        if let Ok(mut now) = self.now.lock() {
            *now = to;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map_or_else(|poisoned| *poisoned.into_inner(), |now| *now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn system_clock_is_strictly_increasing() {
        let clock = SystemClock::new();
        let mut previous = clock.now();
        for _ in 0..1_000 {
            let current = clock.now();
            assert!(current > previous);
            previous = current;
        }
    }

    #[test]
    fn system_clock_has_millisecond_resolution() {
        let now = SystemClock::new().now();
        assert_eq!(now.timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn manual_clock_moves_on_demand() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);
        clock.advance(Duration::seconds(5));
        assert_eq!(clock.now(), start + Duration::seconds(5));
        clock.set(start);
        assert_eq!(clock.now(), start);
    }
}
