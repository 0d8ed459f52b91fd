//! Crossover signal direction.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of an EMA crossover. "No signal" is represented as `Option::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    /// Fast EMA crossed above the slow EMA.
    Buy,
    /// Fast EMA crossed below the slow EMA.
    Sell,
}

impl Signal {
    pub fn as_str(self) -> &'static str {
        match self {
            Signal::Buy => "BUY",
            Signal::Sell => "SELL",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
