//! Last-signal memory per (symbol, timeframe) pair.
//!
//! The alert loop consults this before notifying so that a crossover that is
//! still visible on consecutive polls is announced once. State lives only for
//! the process lifetime.

use std::collections::HashMap;

use emacross_core::domain::{Signal, Symbol, Timeframe};

/// Key of one monitored pair.
pub type PairKey = (Symbol, Timeframe);

#[derive(Debug, Clone, Default)]
pub struct LastSignalState {
    entries: HashMap<PairKey, Option<Signal>>,
}

impl LastSignalState {
    /// Every symbol × timeframe pair starts with no recorded signal. Later
    /// observations never add pairs outside this set.
    pub fn new(symbols: &[Symbol], timeframes: &[Timeframe]) -> Self {
        let entries = symbols
            .iter()
            .flat_map(|s| timeframes.iter().map(move |tf| ((s.clone(), *tf), None)))
            .collect();
        Self { entries }
    }

    /// Last alerted signal for a pair. `None` for both "nothing yet" and
    /// unknown pairs; use [`contains`](Self::contains) to tell them apart.
    pub fn last(&self, symbol: &Symbol, timeframe: Timeframe) -> Option<Signal> {
        self.entries
            .get(&(symbol.clone(), timeframe))
            .copied()
            .flatten()
    }

    pub fn contains(&self, symbol: &Symbol, timeframe: Timeframe) -> bool {
        self.entries.contains_key(&(symbol.clone(), timeframe))
    }

    /// Record a detection result and report whether it warrants an alert.
    ///
    /// Returns the signal when it is present and differs from the stored one
    /// (including the first signal after startup); the stored value is
    /// updated in that case. Absent detections leave the state alone.
    pub fn observe(
        &mut self,
        symbol: &Symbol,
        timeframe: Timeframe,
        detected: Option<Signal>,
    ) -> Option<Signal> {
        let signal = detected?;
        let slot = self.entries.get_mut(&(symbol.clone(), timeframe))?;
        if *slot == Some(signal) {
            return None;
        }
        *slot = Some(signal);
        Some(signal)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
