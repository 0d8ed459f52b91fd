//! Fast/slow EMA crossover: golden cross and death cross detection on the
//! most recent pair of bars.
//!
//! Emits `Buy` when the fast EMA crosses above the slow EMA between the
//! second-to-last and the last bar, `Sell` when it crosses below. Ties at the
//! previous point count as "not yet crossed".

use thiserror::Error;

use crate::domain::{Bar, Signal};
use crate::indicators::{Ema, Indicator};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DetectError {
    #[error("insufficient data: {available} bars < {required} required")]
    InsufficientData { required: usize, available: usize },

    #[error("invalid periods: fast={fast}, slow={slow} (need 1 < fast < slow)")]
    InvalidPeriods { fast: usize, slow: usize },
}

/// Classify the last two points of precomputed fast/slow EMA series.
///
/// Both slices must hold at least two values; shorter input yields `None`.
/// NaN anywhere in the compared points yields `None` because every
/// comparison against NaN is false.
pub fn crossover_from_series(fast: &[f64], slow: &[f64]) -> Option<Signal> {
    let n = fast.len().min(slow.len());
    if n < 2 {
        return None;
    }
    let (fast_prev, fast_cur) = (fast[fast.len() - 2], fast[fast.len() - 1]);
    let (slow_prev, slow_cur) = (slow[slow.len() - 2], slow[slow.len() - 1]);

    // Golden cross: previous fast <= slow, current fast > slow.
    if fast_prev <= slow_prev && fast_cur > slow_cur {
        return Some(Signal::Buy);
    }

    // Death cross: previous fast >= slow, current fast < slow.
    if fast_prev >= slow_prev && fast_cur < slow_cur {
        return Some(Signal::Sell);
    }

    None
}

/// Detect an EMA crossover at the end of `bars`.
///
/// Requires `slow_period + 2` bars so both compared points sit past the slow
/// EMA's warm-up span.
pub fn detect(
    bars: &[Bar],
    fast_period: usize,
    slow_period: usize,
) -> Result<Option<Signal>, DetectError> {
    CrossoverDetector::new(fast_period, slow_period)?.detect(bars)
}

/// Validated fast/slow EMA pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossoverDetector {
    fast: Ema,
    slow: Ema,
}

impl CrossoverDetector {
    pub fn new(fast_period: usize, slow_period: usize) -> Result<Self, DetectError> {
        let invalid = DetectError::InvalidPeriods {
            fast: fast_period,
            slow: slow_period,
        };
        if fast_period < 2 || slow_period <= fast_period {
            return Err(invalid);
        }
        let fast = Ema::new(fast_period).ok_or_else(|| invalid.clone())?;
        let slow = Ema::new(slow_period).ok_or(invalid)?;
        Ok(Self { fast, slow })
    }

    pub fn fast_period(&self) -> usize {
        self.fast.period()
    }

    pub fn slow_period(&self) -> usize {
        self.slow.period()
    }

    /// Minimum series length accepted by [`CrossoverDetector::detect`].
    pub fn min_bars(&self) -> usize {
        self.slow.warmup() + 2
    }

    pub fn detect(&self, bars: &[Bar]) -> Result<Option<Signal>, DetectError> {
        if bars.len() < self.min_bars() {
            return Err(DetectError::InsufficientData {
                required: self.min_bars(),
                available: bars.len(),
            });
        }

        let fast = self.fast.compute(bars);
        let slow = self.slow.compute(bars);
        Ok(crossover_from_series(&fast, &slow))
    }
}
