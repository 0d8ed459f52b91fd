//! Broker wall clock.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, FixedOffset, Offset, Utc};

/// Source of "now" on the broker-local clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// System time shifted to the broker's UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<FixedOffset>>,
}

impl ManualClock {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<FixedOffset>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn system_clock_uses_offset() {
        let plus_three = FixedOffset::east_opt(3 * 3600).unwrap();
        let now = SystemClock::new(plus_three).now();
        assert_eq!(*now.offset(), plus_three);
        let drift = (now.with_timezone(&Utc) - Utc::now()).num_seconds().abs();
        assert!(drift < 5);
    }

    #[test]
    fn manual_clock_moves_on_request() {
        let tz = FixedOffset::east_opt(0).unwrap();
        let t0 = tz.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
        let clock = ManualClock::new(t0);
        assert_eq!(clock.now(), t0);
        clock.advance(Duration::minutes(30));
        assert_eq!(clock.now(), t0 + Duration::minutes(30));
        clock.set(t0);
        assert_eq!(clock.now(), t0);
    }
}
