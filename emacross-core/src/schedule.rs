//! Candle-close scheduling.
//!
//! Bars align to broker wall-clock boundaries whose minute-of-day is a
//! multiple of the timeframe length: M30 closes at :00 and :30, H1 at the top
//! of every hour, D1 at midnight. All arithmetic runs on the broker-local
//! clock carried by the `FixedOffset` of `now`.

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, NaiveTime, Timelike};
use thiserror::Error;

use crate::domain::Timeframe;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("no timeframes to schedule")]
    NoTimeframes,
}

/// Next candle close strictly after `now`, on the broker-local clock.
///
/// The result is truncated to whole minutes. When `now` sits exactly on a
/// boundary the following boundary is returned, never `now` itself.
pub fn next_close(timeframe: Timeframe, now: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    let local = now.naive_local();
    let next = next_close_local(timeframe, local);
    now + (next - local)
}

/// Same as [`next_close`] on a naive broker-local timestamp.
pub fn next_close_local(timeframe: Timeframe, now: NaiveDateTime) -> NaiveDateTime {
    let length = timeframe.minutes();
    let minute_of_day = now.hour() * 60 + now.minute();
    // May equal 1440: that is midnight of the following day.
    let next_minute = (minute_of_day / length + 1) * length;
    let midnight = now.date().and_time(NaiveTime::MIN);
    midnight + Duration::minutes(i64::from(next_minute))
}

/// Earliest candle close across `timeframes`, plus the settle delay that lets
/// the terminal finalize the just-closed bar.
pub fn next_wake(
    timeframes: &[Timeframe],
    now: DateTime<FixedOffset>,
    settle: Duration,
) -> Result<DateTime<FixedOffset>, ScheduleError> {
    timeframes
        .iter()
        .map(|tf| next_close(*tf, now))
        .min()
        .map(|close| close + settle)
        .ok_or(ScheduleError::NoTimeframes)
}

/// Time to sleep from `now` until `wake`; zero if `wake` is already past.
pub fn sleep_until(now: DateTime<FixedOffset>, wake: DateTime<FixedOffset>) -> std::time::Duration {
    (wake - now).to_std().unwrap_or(std::time::Duration::ZERO)
}

/// Minute-of-day of a broker-local timestamp.
pub fn minute_of_day(t: DateTime<FixedOffset>) -> u32 {
    t.hour() * 60 + t.minute()
}
