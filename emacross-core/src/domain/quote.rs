//! Live bid/ask quote.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub bid: f64,
    pub ask: f64,
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
}

impl Quote {
    pub fn new(bid: f64, ask: f64) -> Self {
        Self {
            bid,
            ask,
            time: None,
        }
    }

    /// Midpoint of bid and ask; this is the price reported to users.
    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }

    /// A quote is usable when both sides are finite and positive.
    pub fn is_valid(&self) -> bool {
        self.bid.is_finite() && self.ask.is_finite() && self.bid > 0.0 && self.ask > 0.0
    }
}
