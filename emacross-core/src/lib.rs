//! EMACross Core: domain types, EMA crossover detection, candle scheduling,
//! and the two external collaborators (trading terminal and chat channel).
//!
//! This crate contains everything the alert bot needs that does not own a loop:
//! - Domain types (symbols, timeframes, bars, quotes, signals)
//! - EMA indicator and the crossover detector built on it
//! - Candle-close scheduling against broker wall-clock time
//! - `MarketDataSource` trait and the HTTP terminal bridge client
//! - `NotificationChannel` trait and the Telegram Bot API client

pub mod data;
pub mod domain;
pub mod indicators;
pub mod notify;
pub mod schedule;
pub mod signal;
