//! Market data: the terminal abstraction and its HTTP bridge client.

pub mod circuit_breaker;
pub mod provider;
pub mod terminal;

pub use circuit_breaker::CircuitBreaker;
pub use provider::{DataError, MarketDataSource, TerminalInfo};
pub use terminal::{TerminalClient, TerminalSettings};
