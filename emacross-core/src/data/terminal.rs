//! Trading terminal bridge client.
//!
//! The terminal itself only exposes an in-process API, so it is reached
//! through a small HTTP/JSON bridge running next to it:
//!
//! - `GET /ping` → `{"connected": true, "terminal": "...", "version": "..."}`
//! - `GET /rates?symbol=&timeframe=&from=&count=` → `{"rates": [{time, open, high, low, close, tick_volume}]}`
//! - `GET /tick?symbol=` → `{"time", "bid", "ask"}`, 404 when there is no tick
//!
//! Errors come back as `{"error": {"code", "message"}}`. Requests retry with
//! exponential backoff on connection failures, timeouts and 5xx. Only
//! connection failures and timeouts count toward the circuit breaker: a 5xx or
//! an error envelope is about one request, and must not lock out other
//! symbols. The backoff is a plain sleep bounded by `max_retries` and
//! `base_delay`; cancellation is noticed once the request returns.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use super::circuit_breaker::CircuitBreaker;
use super::provider::{DataError, MarketDataSource, TerminalInfo};
use crate::domain::{Bar, Quote, Symbol, Timeframe};

#[derive(Debug, Deserialize)]
struct PingResponse {
    connected: bool,
    #[serde(default)]
    terminal: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    error: Option<BridgeError>,
}

#[derive(Debug, Deserialize)]
struct RatesResponse {
    #[serde(default)]
    rates: Option<Vec<RateRow>>,
    #[serde(default)]
    error: Option<BridgeError>,
}

#[derive(Debug, Deserialize)]
struct RateRow {
    time: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    tick_volume: u64,
}

#[derive(Debug, Deserialize)]
struct TickResponse {
    #[serde(default)]
    time: Option<i64>,
    bid: f64,
    ask: f64,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: BridgeError,
}

#[derive(Debug, Deserialize)]
struct BridgeError {
    code: i64,
    message: String,
}

/// Connection settings for the bridge.
#[derive(Debug, Clone)]
pub struct TerminalSettings {
    pub base_url: String,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for TerminalSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8228".into(),
            request_timeout: Duration::from_secs(30),
            max_retries: 2,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// HTTP client for the terminal bridge.
pub struct TerminalClient {
    client: reqwest::blocking::Client,
    settings: TerminalSettings,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl TerminalClient {
    pub fn new(
        settings: TerminalSettings,
        circuit_breaker: Arc<CircuitBreaker>,
    ) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(settings.request_timeout)
            .user_agent(concat!("emacross/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            settings,
            circuit_breaker,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.settings.base_url.trim_end_matches('/'))
    }

    /// Parse a rates response into bars, oldest first.
    fn parse_rates(symbol: &Symbol, resp: RatesResponse) -> Result<Vec<Bar>, DataError> {
        if let Some(err) = resp.error {
            return Err(DataError::Rejected {
                code: err.code,
                message: err.message,
            });
        }

        let rows = resp
            .rates
            .ok_or_else(|| DataError::ResponseFormatChanged("no rates and no error".into()))?;

        let mut bars = Vec::with_capacity(rows.len());
        for row in rows {
            let open_time = DateTime::from_timestamp(row.time, 0).ok_or_else(|| {
                DataError::ResponseFormatChanged(format!("invalid bar time: {}", row.time))
            })?;
            let bar = Bar {
                symbol: symbol.clone(),
                open_time,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                tick_volume: row.tick_volume,
            };
            if !bar.is_sane() {
                warn!(symbol = %symbol, time = row.time, "dropping malformed bar");
                continue;
            }
            bars.push(bar);
        }

        bars.sort_by_key(|b| b.open_time);
        Ok(bars)
    }

    fn parse_tick(resp: TickResponse) -> Option<Quote> {
        let quote = Quote {
            bid: resp.bid,
            ask: resp.ask,
            time: resp.time.and_then(|t| DateTime::from_timestamp(t, 0)),
        };
        quote.is_valid().then_some(quote)
    }

    fn rejection(status: reqwest::StatusCode, body: &str) -> DataError {
        match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(env) => DataError::Rejected {
                code: env.error.code,
                message: env.error.message,
            },
            Err(_) => DataError::Rejected {
                code: i64::from(status.as_u16()),
                message: body.trim().to_string(),
            },
        }
    }

    /// GET a JSON document with retry and circuit breaker logic.
    ///
    /// Returns `Ok(None)` on HTTP 404.
    fn get_with_retry<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, DataError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        let url = self.url(path);
        let mut last_error = None;

        for attempt in 0..=self.settings.max_retries {
            if attempt > 0 {
                let delay = self.settings.base_delay * 2u32.pow(attempt - 1);
                debug!(path, attempt, ?delay, "retrying terminal request");
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            match self.client.get(&url).query(query).send() {
                Ok(resp) => {
                    // Any HTTP answer means the bridge is up.
                    self.circuit_breaker.record_success();
                    let status = resp.status();

                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Ok(None);
                    }

                    if status.is_server_error() {
                        let body = resp.text().unwrap_or_default();
                        last_error = Some(Self::rejection(status, &body));
                        continue;
                    }

                    if !status.is_success() {
                        let body = resp.text().unwrap_or_default();
                        return Err(Self::rejection(status, &body));
                    }

                    let parsed: T = resp.json().map_err(|e| {
                        DataError::ResponseFormatChanged(format!("failed to parse {path}: {e}"))
                    })?;
                    return Ok(Some(parsed));
                }
                Err(e) if e.is_connect() || e.is_timeout() => {
                    self.record_failure();
                    last_error = Some(DataError::Unreachable(e.to_string()));
                }
                Err(e) => return Err(DataError::Unreachable(e.to_string())),
            }
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }

    fn record_failure(&self) {
        if self.circuit_breaker.record_failure() {
            warn!(
                cooldown_secs = self.circuit_breaker.remaining_cooldown().as_secs(),
                "terminal circuit breaker tripped"
            );
        }
    }
}

impl MarketDataSource for TerminalClient {
    fn name(&self) -> &str {
        "terminal_bridge"
    }

    fn connect(&self) -> Result<TerminalInfo, DataError> {
        let ping: PingResponse = self
            .get_with_retry("ping", &[])?
            .ok_or_else(|| DataError::Unreachable(format!("no bridge at {}", self.url("ping"))))?;

        if !ping.connected {
            let reason = ping
                .error
                .map(|e| format!("{} ({})", e.message, e.code))
                .unwrap_or_else(|| "terminal reports disconnected".into());
            return Err(DataError::NotConnected(reason));
        }

        Ok(TerminalInfo {
            terminal: ping.terminal.unwrap_or_else(|| "unknown".into()),
            version: ping.version,
        })
    }

    fn fetch_bars(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        from: DateTime<Utc>,
        count: usize,
    ) -> Result<Vec<Bar>, DataError> {
        let query = [
            ("symbol", symbol.terminal_name().to_string()),
            ("timeframe", timeframe.label().to_string()),
            ("from", from.timestamp().to_string()),
            ("count", count.to_string()),
        ];
        let resp: RatesResponse = self.get_with_retry("rates", &query)?.ok_or_else(|| {
            DataError::SymbolNotFound {
                symbol: symbol.terminal_name().to_string(),
            }
        })?;
        Self::parse_rates(symbol, resp)
    }

    fn quote(&self, symbol: &Symbol) -> Result<Option<Quote>, DataError> {
        let query = [("symbol", symbol.terminal_name().to_string())];
        let tick: Option<TickResponse> = self.get_with_retry("tick", &query)?;
        Ok(tick.and_then(Self::parse_tick))
    }
}
