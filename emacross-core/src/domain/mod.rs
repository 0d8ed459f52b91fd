//! Domain types for EMACross

pub mod bar;
pub mod quote;
pub mod signal;
pub mod symbol;
pub mod timeframe;

pub use bar::Bar;
pub use quote::Quote;
pub use signal::Signal;
pub use symbol::{Symbol, SymbolError};
pub use timeframe::{Timeframe, TimeframeError};
