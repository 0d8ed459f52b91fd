//! Bot configuration: TOML file, environment overrides, validation.
//!
//! ```toml
//! [market]
//! symbols = ["XAUUSDm", "BTCUSDm", "ETHUSDm"]
//! fast_timeframe = "M30"
//! slow_timeframe = "H1"
//!
//! [ema]
//! fast_period = 21
//! slow_period = 50
//!
//! [telegram]
//! bot_token = "123:abc"
//! chat_id = "-1001234567890"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use emacross_core::data::TerminalSettings;
use emacross_core::domain::{Symbol, Timeframe};
use emacross_core::notify::TelegramSettings;
use emacross_core::signal::CrossoverDetector;

/// Environment variables that override file values.
pub const ENV_BOT_TOKEN: &str = "EMACROSS_BOT_TOKEN";
pub const ENV_CHAT_ID: &str = "EMACROSS_CHAT_ID";
pub const ENV_TERMINAL_URL: &str = "EMACROSS_TERMINAL_URL";

/// Settle delays longer than this would push the poll past a whole M5 bar.
const MAX_SETTLE_DELAY_SECS: u64 = 300;

/// Upper bound on bridge retries; keeps the uninterruptible backoff short.
const MAX_TERMINAL_RETRIES: u32 = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BotConfig {
    pub market: MarketConfig,
    pub ema: EmaConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub terminal: TerminalConfig,
    pub telegram: TelegramConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarketConfig {
    /// Monitored symbols; the first one answers bare `/price` queries.
    pub symbols: Vec<Symbol>,
    pub fast_timeframe: Timeframe,
    pub slow_timeframe: Timeframe,
    #[serde(default = "default_bars_per_fetch")]
    pub bars_per_fetch: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmaConfig {
    pub fast_period: usize,
    pub slow_period: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleConfig {
    #[serde(default = "default_settle_delay_secs")]
    pub settle_delay_secs: u64,
    /// Broker server clock relative to UTC; candle boundaries are computed on it.
    #[serde(default)]
    pub broker_utc_offset_minutes: i32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            settle_delay_secs: default_settle_delay_secs(),
            broker_utc_offset_minutes: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TerminalConfig {
    #[serde(default = "default_terminal_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_breaker_cooldown_secs")]
    pub breaker_cooldown_secs: u64,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            base_url: default_terminal_url(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            breaker_cooldown_secs: default_breaker_cooldown_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub chat_id: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_parse_mode")]
    pub parse_mode: Option<String>,
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

fn default_bars_per_fetch() -> usize {
    150
}
fn default_settle_delay_secs() -> u64 {
    2
}
fn default_terminal_url() -> String {
    TerminalSettings::default().base_url
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    2
}
fn default_breaker_cooldown_secs() -> u64 {
    300
}
fn default_api_url() -> String {
    "https://api.telegram.org".into()
}
fn default_parse_mode() -> Option<String> {
    Some("HTML".into())
}
fn default_poll_timeout_secs() -> u64 {
    100
}
fn default_retry_delay_secs() -> u64 {
    1
}

impl BotConfig {
    /// Read, apply environment overrides, and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()
    }

    /// Parse a TOML file without overrides or validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Override secrets and endpoints from `lookup` (normally the process
    /// environment). Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(token) = get(ENV_BOT_TOKEN) {
            self.telegram.bot_token = token;
        }
        if let Some(chat) = get(ENV_CHAT_ID) {
            self.telegram.chat_id = chat;
        }
        if let Some(url) = get(ENV_TERMINAL_URL) {
            self.terminal.base_url = url;
        }
    }

    /// Check cross-field constraints. Duplicate symbols (case-insensitive)
    /// are dropped, keeping the first occurrence.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        let mut unique: Vec<Symbol> = Vec::with_capacity(self.market.symbols.len());
        for sym in self.market.symbols.drain(..) {
            if unique.contains(&sym) {
                warn!(symbol = %sym, "duplicate symbol in config ignored");
            } else {
                unique.push(sym);
            }
        }
        self.market.symbols = unique;

        if self.market.symbols.is_empty() {
            return Err(ConfigError::Invalid("market.symbols must not be empty".into()));
        }
        if self.market.fast_timeframe == self.market.slow_timeframe {
            return Err(ConfigError::Invalid(format!(
                "market.fast_timeframe and market.slow_timeframe must differ (both {})",
                self.market.fast_timeframe
            )));
        }

        let detector = CrossoverDetector::new(self.ema.fast_period, self.ema.slow_period)
            .map_err(|e| ConfigError::Invalid(format!("ema: {e}")))?;
        if self.market.bars_per_fetch < detector.min_bars() {
            return Err(ConfigError::Invalid(format!(
                "market.bars_per_fetch = {} is below the {} bars needed for slow_period = {}",
                self.market.bars_per_fetch,
                detector.min_bars(),
                self.ema.slow_period
            )));
        }

        if self.schedule.settle_delay_secs > MAX_SETTLE_DELAY_SECS {
            return Err(ConfigError::Invalid(format!(
                "schedule.settle_delay_secs = {} exceeds {MAX_SETTLE_DELAY_SECS}",
                self.schedule.settle_delay_secs
            )));
        }
        if self.broker_offset().is_none() {
            return Err(ConfigError::Invalid(format!(
                "schedule.broker_utc_offset_minutes = {} is out of range",
                self.schedule.broker_utc_offset_minutes
            )));
        }

        if self.terminal.max_retries > MAX_TERMINAL_RETRIES {
            return Err(ConfigError::Invalid(format!(
                "terminal.max_retries = {} exceeds {MAX_TERMINAL_RETRIES}",
                self.terminal.max_retries
            )));
        }
        if self.terminal.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("terminal.base_url must not be empty".into()));
        }
        if self.telegram.bot_token.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "telegram.bot_token is empty (set it in the file or via {ENV_BOT_TOKEN})"
            )));
        }
        if self.telegram.chat_id.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "telegram.chat_id is empty (set it in the file or via {ENV_CHAT_ID})"
            )));
        }
        if self.telegram.poll_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "telegram.poll_timeout_secs must be at least 1".into(),
            ));
        }
        if self.telegram.retry_delay_secs == 0 {
            return Err(ConfigError::Invalid(
                "telegram.retry_delay_secs must be at least 1".into(),
            ));
        }

        Ok(self)
    }

    /// Fast then slow polling timeframe.
    pub fn timeframes(&self) -> [Timeframe; 2] {
        [self.market.fast_timeframe, self.market.slow_timeframe]
    }

    /// Symbol used when a `/price` query names none (or an unknown one).
    pub fn default_symbol(&self) -> Option<&Symbol> {
        self.market.symbols.first()
    }

    pub fn detector(&self) -> Result<CrossoverDetector, ConfigError> {
        CrossoverDetector::new(self.ema.fast_period, self.ema.slow_period)
            .map_err(|e| ConfigError::Invalid(format!("ema: {e}")))
    }

    pub fn broker_offset(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.schedule.broker_utc_offset_minutes.checked_mul(60)?)
    }

    pub fn settle_delay(&self) -> chrono::Duration {
        let secs = self.schedule.settle_delay_secs.min(MAX_SETTLE_DELAY_SECS);
        chrono::Duration::seconds(secs as i64)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.telegram.poll_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.telegram.retry_delay_secs)
    }

    pub fn terminal_settings(&self) -> TerminalSettings {
        TerminalSettings {
            base_url: self.terminal.base_url.clone(),
            request_timeout: Duration::from_secs(self.terminal.request_timeout_secs),
            max_retries: self.terminal.max_retries,
            ..TerminalSettings::default()
        }
    }

    pub fn breaker_cooldown(&self) -> Duration {
        Duration::from_secs(self.terminal.breaker_cooldown_secs)
    }

    pub fn telegram_settings(&self) -> TelegramSettings {
        TelegramSettings {
            api_url: self.telegram.api_url.clone(),
            parse_mode: self.telegram.parse_mode.clone(),
            ..TelegramSettings::new(self.telegram.bot_token.clone(), self.telegram.chat_id.clone())
        }
    }
}
