//! Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = k * close[t] + (1 - k) * EMA[t-1], k = 2 / (period + 1)
//! Seed: EMA[0] = close[0], so every index carries a value. The first
//! `period` or so values still lean on the seed and are not trusted for
//! crossover decisions; the detector enforces that by length.

use crate::domain::Bar;

use super::Indicator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ema {
    period: usize,
    name: String,
}

impl Ema {
    /// Returns `None` for a zero period.
    pub fn new(period: usize) -> Option<Self> {
        if period == 0 {
            return None;
        }
        Some(Self {
            period,
            name: format!("ema_{period}"),
        })
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn warmup(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        ema_of_series(&closes, self.period)
    }
}

/// Compute raw EMA values from a pre-extracted f64 slice.
///
/// Empty input or a zero period yields an empty vector.
pub fn ema_of_series(values: &[f64], period: usize) -> Vec<f64> {
    if values.is_empty() || period == 0 {
        return Vec::new();
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut result = Vec::with_capacity(values.len());
    let mut prev = values[0];
    result.push(prev);

    for &v in &values[1..] {
        let ema = v * k + prev * (1.0 - k);
        result.push(ema);
        prev = ema;
    }

    result
}
