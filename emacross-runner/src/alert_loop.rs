//! Alert loop: wait for candle closes, scan every pair, notify on new crossovers.
//!
//! Failures stay local to the pair or message they occur on. A fetch error
//! skips the pair for this cycle; a delivery error is logged and the signal
//! is still recorded, so an alert is sent at most once.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use tracing::{debug, info, warn};

use emacross_core::data::MarketDataSource;
use emacross_core::domain::{Signal, Symbol, Timeframe};
use emacross_core::notify::NotificationChannel;
use emacross_core::schedule::{self, ScheduleError};
use emacross_core::signal::{CrossoverDetector, DetectError};

use crate::cancel::CancelToken;
use crate::clock::Clock;
use crate::config::{BotConfig, ConfigError};
use crate::state::LastSignalState;

/// Everything the alert loop needs from configuration.
#[derive(Debug, Clone)]
pub struct AlertSettings {
    pub symbols: Vec<Symbol>,
    pub timeframes: Vec<Timeframe>,
    pub detector: CrossoverDetector,
    pub bars_per_fetch: usize,
    pub settle_delay: chrono::Duration,
    /// Detect and report, but never send.
    pub dry_run: bool,
}

impl AlertSettings {
    pub fn from_config(config: &BotConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            symbols: config.market.symbols.clone(),
            timeframes: config.timeframes().to_vec(),
            detector: config.detector()?,
            bars_per_fetch: config.market.bars_per_fetch,
            settle_delay: config.settle_delay(),
            dry_run: false,
        })
    }
}

/// A crossover seen during one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub symbol: Symbol,
    pub timeframe: Timeframe,
    pub signal: Signal,
    /// Differs from the last recorded signal for the pair.
    pub fresh: bool,
}

/// Outcome of one polling pass over every pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub pairs_checked: usize,
    pub pairs_skipped: usize,
    pub detections: Vec<Detection>,
    pub alerts_sent: usize,
    pub delivery_failures: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Waiting { until: DateTime<FixedOffset> },
    Polling,
}

/// Alert text as delivered to the chat.
pub fn format_alert(
    signal: Signal,
    symbol: &Symbol,
    timeframe: Timeframe,
    at: DateTime<FixedOffset>,
) -> String {
    format!(
        "EMA {signal} signal detected on {symbol} [{timeframe}] at {}",
        at.format("%Y-%m-%d %H:%M:%S")
    )
}

pub struct AlertLoop {
    market: Arc<dyn MarketDataSource>,
    channel: Arc<dyn NotificationChannel>,
    clock: Arc<dyn Clock>,
    settings: AlertSettings,
    state: LastSignalState,
}

impl AlertLoop {
    pub fn new(
        market: Arc<dyn MarketDataSource>,
        channel: Arc<dyn NotificationChannel>,
        clock: Arc<dyn Clock>,
        settings: AlertSettings,
    ) -> Self {
        let state = LastSignalState::new(&settings.symbols, &settings.timeframes);
        Self {
            market,
            channel,
            clock,
            settings,
            state,
        }
    }

    pub fn state(&self) -> &LastSignalState {
        &self.state
    }

    pub fn settings(&self) -> &AlertSettings {
        &self.settings
    }

    /// Earliest candle close across the configured timeframes, plus settle.
    pub fn next_wake(&self) -> Result<DateTime<FixedOffset>, ScheduleError> {
        schedule::next_wake(
            &self.settings.timeframes,
            self.clock.now(),
            self.settings.settle_delay,
        )
    }

    /// Scan every symbol × timeframe once.
    pub fn poll_once(&mut self) -> CycleReport {
        let mut report = CycleReport::default();
        let symbols = self.settings.symbols.clone();
        let timeframes = self.settings.timeframes.clone();
        for symbol in &symbols {
            for &timeframe in &timeframes {
                report.pairs_checked += 1;
                self.check_pair(symbol, timeframe, &mut report);
            }
        }
        report
    }

    fn check_pair(&mut self, symbol: &Symbol, timeframe: Timeframe, report: &mut CycleReport) {
        let now = self.clock.now();
        let bars = match self.market.fetch_bars(
            symbol,
            timeframe,
            now.with_timezone(&Utc),
            self.settings.bars_per_fetch,
        ) {
            Ok(bars) => bars,
            Err(e) => {
                warn!(symbol = %symbol, timeframe = %timeframe, error = %e, "failed to fetch bars");
                report.pairs_skipped += 1;
                return;
            }
        };

        let minimum = self.settings.detector.slow_period() + 1;
        if bars.len() < minimum {
            debug!(
                symbol = %symbol,
                timeframe = %timeframe,
                available = bars.len(),
                minimum,
                "not enough bars, skipping"
            );
            report.pairs_skipped += 1;
            return;
        }

        let detected = match self.settings.detector.detect(&bars) {
            Ok(detected) => detected,
            Err(DetectError::InsufficientData { required, available }) => {
                debug!(symbol = %symbol, timeframe = %timeframe, required, available, "warm-up incomplete, skipping");
                report.pairs_skipped += 1;
                return;
            }
            Err(e) => {
                warn!(symbol = %symbol, timeframe = %timeframe, error = %e, "detector rejected input");
                report.pairs_skipped += 1;
                return;
            }
        };

        let Some(signal) = detected else {
            return;
        };
        let fresh = self.state.observe(symbol, timeframe, Some(signal)).is_some();
        report.detections.push(Detection {
            symbol: symbol.clone(),
            timeframe,
            signal,
            fresh,
        });
        if !fresh {
            debug!(symbol = %symbol, timeframe = %timeframe, signal = %signal, "signal unchanged");
            return;
        }

        let text = format_alert(signal, symbol, timeframe, now);
        if self.settings.dry_run {
            info!(symbol = %symbol, timeframe = %timeframe, signal = %signal, "{text} (dry run)");
            return;
        }
        match self.channel.send_message(self.channel.default_chat(), &text) {
            Ok(()) => {
                info!(symbol = %symbol, timeframe = %timeframe, signal = %signal, "alert sent");
                report.alerts_sent += 1;
            }
            Err(e) => {
                warn!(symbol = %symbol, timeframe = %timeframe, error = %e, "alert delivery failed");
                report.delivery_failures += 1;
            }
        }
    }

    /// Alternate between waiting for the next close and polling until
    /// `cancel` fires.
    pub fn run(&mut self, cancel: &CancelToken) -> Result<(), ScheduleError> {
        info!(
            symbols = self.settings.symbols.len(),
            timeframes = ?self.settings.timeframes,
            "alert loop started"
        );
        let mut phase = Phase::Waiting {
            until: self.next_wake()?,
        };
        while !cancel.is_cancelled() {
            phase = match phase {
                Phase::Waiting { until } => {
                    let wait = schedule::sleep_until(self.clock.now(), until);
                    debug!(wake_at = %until, wait_secs = wait.as_secs(), "waiting for candle close");
                    if !cancel.sleep(wait) {
                        break;
                    }
                    Phase::Polling
                }
                Phase::Polling => {
                    let report = self.poll_once();
                    info!(
                        checked = report.pairs_checked,
                        skipped = report.pairs_skipped,
                        alerts = report.alerts_sent,
                        delivery_failures = report.delivery_failures,
                        "poll cycle complete"
                    );
                    Phase::Waiting {
                        until: self.next_wake()?,
                    }
                }
            };
        }
        info!("alert loop stopped");
        Ok(())
    }
}
