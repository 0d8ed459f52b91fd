//! Market data source trait and structured error types.
//!
//! The `MarketDataSource` trait abstracts over the trading terminal so the
//! loops can be driven by an in-process fake in tests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Bar, Quote, Symbol, Timeframe};

/// Structured error types for market data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("terminal unreachable: {0}")]
    Unreachable(String),

    #[error("terminal not connected to a trade server: {0}")]
    NotConnected(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("terminal rejected request ({code}): {message}")]
    Rejected { code: i64, message: String },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("hard stop: terminal requests suspended (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("data error: {0}")]
    Other(String),
}

/// Terminal identity returned by the startup handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalInfo {
    pub terminal: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// Trait for market data sources (the trading terminal, or a fake).
///
/// Every call is a self-contained request; implementations must be safe to
/// share between the alert thread and the command thread.
pub trait MarketDataSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Startup handshake. A failure here is the one fatal condition.
    fn connect(&self) -> Result<TerminalInfo, DataError>;

    /// Fetch up to `count` bars ending at `from`, oldest first.
    fn fetch_bars(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        from: DateTime<Utc>,
        count: usize,
    ) -> Result<Vec<Bar>, DataError>;

    /// Live bid/ask, or `None` when the terminal has no tick for the symbol.
    fn quote(&self, symbol: &Symbol) -> Result<Option<Quote>, DataError>;
}
