//! Indicator trait and implementations.
//!
//! Indicators are pure functions: bar history in, numeric series out, one
//! value per input bar.

pub mod ema;

pub use ema::{ema_of_series, Ema};

use crate::domain::Bar;

/// Trait for indicators computed over a full bar series.
///
/// # Look-ahead guard
/// No value at index t may depend on bars after t. The truncated-vs-full
/// series test in each implementation checks this.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "ema_21").
    fn name(&self) -> &str;

    /// Number of bars before the output is considered converged.
    fn warmup(&self) -> usize;

    /// Compute the indicator for the entire bar series.
    ///
    /// Returns a `Vec<f64>` of the same length as `bars`.
    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

/// Create synthetic bars from close prices for testing.
///
/// open = previous close (or close for the first bar), high/low = max/min of
/// open and close widened by 1.0, bars one hour apart.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    use crate::domain::Symbol;
    use chrono::TimeZone;

    let base = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                symbol: Symbol::new("TEST"),
                open_time: base + chrono::Duration::hours(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                tick_volume: 100,
            }
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
