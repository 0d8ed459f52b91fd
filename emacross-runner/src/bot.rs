//! Bot supervisor: startup handshake and the two worker threads.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info};

use emacross_core::data::{CircuitBreaker, DataError, MarketDataSource, TerminalClient};
use emacross_core::notify::{NotificationChannel, NotifyError, TelegramBot};
use emacross_core::schedule::ScheduleError;

use crate::alert_loop::{AlertLoop, AlertSettings};
use crate::cancel::CancelToken;
use crate::clock::{Clock, SystemClock};
use crate::command_loop::{CommandLoop, CommandSettings};
use crate::config::{BotConfig, ConfigError};

/// Consecutive bridge failures before the breaker opens.
const BREAKER_THRESHOLD: u32 = 3;

/// How often the supervisor checks whether a worker thread has died.
const SUPERVISE_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum BotError {
    #[error("market data source failed to initialize: {0}")]
    Initialization(#[source] DataError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("notification channel setup failed: {0}")]
    Channel(#[from] NotifyError),

    #[error("scheduling failed: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} thread panicked")]
    Panicked(&'static str),
}

/// Wired-up collaborators, ready to start.
///
/// `market` feeds the alert loop and `quotes` the command loop. Built from
/// config they are separate bridge clients with separate breakers, so an
/// outage seen by one loop does not suspend the other.
pub struct Bot {
    config: BotConfig,
    market: Arc<dyn MarketDataSource>,
    quotes: Arc<dyn MarketDataSource>,
    channel: Arc<dyn NotificationChannel>,
    clock: Arc<dyn Clock>,
}

impl Bot {
    /// Build the terminal bridge client, Telegram client and broker clock
    /// from a validated config.
    pub fn from_config(config: BotConfig) -> Result<Self, BotError> {
        let market = terminal_client(&config)?;
        let quotes = terminal_client(&config)?;
        let channel = TelegramBot::new(config.telegram_settings())?;
        let offset = config.broker_offset().ok_or_else(|| {
            ConfigError::Invalid("schedule.broker_utc_offset_minutes is out of range".into())
        })?;
        let mut bot = Self::with_parts(
            config,
            market,
            Arc::new(channel),
            Arc::new(SystemClock::new(offset)),
        );
        bot.quotes = quotes;
        Ok(bot)
    }

    /// Both loops share `market`.
    pub fn with_parts(
        config: BotConfig,
        market: Arc<dyn MarketDataSource>,
        channel: Arc<dyn NotificationChannel>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            quotes: Arc::clone(&market),
            market,
            channel,
            clock,
        }
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn market(&self) -> &Arc<dyn MarketDataSource> {
        &self.market
    }

    pub fn quote_source(&self) -> &Arc<dyn MarketDataSource> {
        &self.quotes
    }

    pub fn channel(&self) -> &Arc<dyn NotificationChannel> {
        &self.channel
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn alert_loop(&self) -> Result<AlertLoop, BotError> {
        Ok(AlertLoop::new(
            Arc::clone(&self.market),
            Arc::clone(&self.channel),
            Arc::clone(&self.clock),
            AlertSettings::from_config(&self.config)?,
        ))
    }

    pub fn command_loop(&self) -> CommandLoop {
        CommandLoop::new(
            Arc::clone(&self.quotes),
            Arc::clone(&self.channel),
            CommandSettings::from_config(&self.config),
        )
    }

    /// Handshake with the terminal, then start both loops on their own
    /// threads. A failed handshake is fatal and nothing is spawned.
    pub fn start(self, cancel: CancelToken) -> Result<BotHandle, BotError> {
        let info = self.market.connect().map_err(BotError::Initialization)?;
        info!(
            source = self.market.name(),
            terminal = %info.terminal,
            version = info.version.as_deref().unwrap_or("unknown"),
            "connected to trading terminal"
        );

        let mut alert_loop = self.alert_loop()?;
        let mut command_loop = self.command_loop();

        let alert_cancel = cancel.clone();
        let alerts = thread::Builder::new()
            .name("emacross-alerts".into())
            .spawn(move || alert_loop.run(&alert_cancel))
            .map_err(|source| BotError::Spawn {
                name: "alert",
                source,
            })?;

        let command_cancel = cancel.clone();
        let commands = match thread::Builder::new()
            .name("emacross-commands".into())
            .spawn(move || command_loop.run(&command_cancel))
        {
            Ok(handle) => handle,
            Err(source) => {
                cancel.cancel();
                let _ = alerts.join();
                return Err(BotError::Spawn {
                    name: "command",
                    source,
                });
            }
        };

        Ok(BotHandle {
            alerts,
            commands,
            cancel,
        })
    }
}

fn terminal_client(config: &BotConfig) -> Result<Arc<dyn MarketDataSource>, BotError> {
    let breaker = Arc::new(CircuitBreaker::new(config.breaker_cooldown(), BREAKER_THRESHOLD));
    let client = TerminalClient::new(config.terminal_settings(), breaker)
        .map_err(BotError::Initialization)?;
    Ok(Arc::new(client))
}

/// Running bot. Dropping it detaches the threads.
pub struct BotHandle {
    alerts: JoinHandle<Result<(), ScheduleError>>,
    commands: JoinHandle<()>,
    cancel: CancelToken,
}

impl BotHandle {
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Stop both loops and wait for them.
    pub fn shutdown(self) -> Result<(), BotError> {
        self.cancel.cancel();
        self.join()
    }

    /// Block until the token is cancelled or either thread exits, then stop
    /// the other one and collect both.
    ///
    /// The command thread notices cancellation between long-polls, so this
    /// can take up to one poll timeout.
    pub fn join(self) -> Result<(), BotError> {
        while !self.alerts.is_finished() && !self.commands.is_finished() {
            if !self.cancel.sleep(SUPERVISE_INTERVAL) {
                break;
            }
        }
        self.cancel.cancel();

        let alerts = self.alerts.join();
        let commands = self.commands.join();

        match alerts {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(error = %e, "alert loop failed");
                return Err(e.into());
            }
            Err(_) => return Err(BotError::Panicked("alert")),
        }
        commands.map_err(|_| BotError::Panicked("command"))?;
        info!("bot stopped");
        Ok(())
    }
}
