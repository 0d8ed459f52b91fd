//! EMA crossover detection.

pub mod crossover;

pub use crossover::{crossover_from_series, detect, CrossoverDetector, DetectError};
