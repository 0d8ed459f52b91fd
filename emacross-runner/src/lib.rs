//! EMACross Runner: the long-running parts of the alert bot.
//!
//! This crate builds on `emacross-core` to provide:
//! - TOML configuration with validation and environment overrides
//! - Per-pair last-signal state for alert deduplication
//! - The `/price` command grammar
//! - Alert loop (candle-close scheduling, detection, notification)
//! - Command loop (long-poll inbound feed, answer price queries)
//! - Bot supervisor: startup handshake, worker threads, cancellation

pub mod alert_loop;
pub mod bot;
pub mod cancel;
pub mod clock;
pub mod command;
pub mod command_loop;
pub mod config;
pub mod state;

pub use alert_loop::{format_alert, AlertLoop, AlertSettings, CycleReport, Detection};
pub use bot::{Bot, BotError, BotHandle};
pub use cancel::CancelToken;
pub use clock::{Clock, ManualClock, SystemClock};
pub use command::{price_failure_reply, price_reply, resolve_symbol, tokenize, Command};
pub use command_loop::{CommandLoop, CommandSettings, Reply};
pub use config::{BotConfig, ConfigError};
pub use state::{LastSignalState, PairKey};
