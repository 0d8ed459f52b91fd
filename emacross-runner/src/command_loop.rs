//! Command loop: long-poll the chat feed and answer `/price` queries.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use emacross_core::data::MarketDataSource;
use emacross_core::domain::Symbol;
use emacross_core::notify::{InboundMessage, NotificationChannel, NotifyError, UpdateCursor};

use crate::cancel::CancelToken;
use crate::command::{price_failure_reply, price_reply, resolve_symbol, Command};
use crate::config::BotConfig;

#[derive(Debug, Clone)]
pub struct CommandSettings {
    /// Monitored symbols; the first answers queries without a known symbol.
    pub symbols: Vec<Symbol>,
    pub poll_timeout: Duration,
    /// Pause after a failed long-poll before trying again.
    pub retry_delay: Duration,
}

impl CommandSettings {
    pub fn from_config(config: &BotConfig) -> Self {
        Self {
            symbols: config.market.symbols.clone(),
            poll_timeout: config.poll_timeout(),
            retry_delay: config.retry_delay(),
        }
    }
}

/// A reply ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub chat_id: String,
    pub text: String,
}

pub struct CommandLoop {
    market: Arc<dyn MarketDataSource>,
    channel: Arc<dyn NotificationChannel>,
    settings: CommandSettings,
    cursor: UpdateCursor,
}

impl CommandLoop {
    pub fn new(
        market: Arc<dyn MarketDataSource>,
        channel: Arc<dyn NotificationChannel>,
        settings: CommandSettings,
    ) -> Self {
        Self {
            market,
            channel,
            settings,
            cursor: UpdateCursor::start(),
        }
    }

    pub fn cursor(&self) -> UpdateCursor {
        self.cursor
    }

    /// Answer for a parsed command.
    pub fn answer(&self, command: &Command) -> Option<String> {
        match command {
            Command::Price { symbol } => {
                let symbol = resolve_symbol(symbol.as_deref(), &self.settings.symbols)?;
                Some(self.price_text(symbol))
            }
        }
    }

    fn price_text(&self, symbol: &Symbol) -> String {
        match self.market.quote(symbol) {
            Ok(Some(quote)) if quote.is_valid() => price_reply(symbol, quote.mid()),
            Ok(_) => {
                debug!(symbol = %symbol, "no quote available");
                price_failure_reply(symbol)
            }
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "quote lookup failed");
                price_failure_reply(symbol)
            }
        }
    }

    /// Reply to one inbound message, if it carries a command. Replies go to
    /// the originating chat, or the default chat when the update has none.
    pub fn handle_message(&self, message: &InboundMessage) -> Option<Reply> {
        let text = message.text.as_deref()?;
        let command = Command::parse(text)?;
        let reply = self.answer(&command)?;
        let chat_id = message
            .chat_id
            .clone()
            .unwrap_or_else(|| self.channel.default_chat().to_string());
        Some(Reply {
            chat_id,
            text: reply,
        })
    }

    /// One long-poll plus replies. Returns the number of replies delivered.
    ///
    /// The cursor moves past every received message whether or not it was a
    /// command or its reply could be sent.
    pub fn poll_once(&mut self) -> Result<usize, NotifyError> {
        let batch = self
            .channel
            .poll_updates(self.cursor, self.settings.poll_timeout)?;
        let mut delivered = 0;
        for message in &batch.messages {
            self.cursor.advance_past(message.update_id);
            let Some(reply) = self.handle_message(message) else {
                continue;
            };
            match self.channel.send_message(&reply.chat_id, &reply.text) {
                Ok(()) => {
                    debug!(chat_id = %reply.chat_id, "reply sent");
                    delivered += 1;
                }
                Err(e) => warn!(chat_id = %reply.chat_id, error = %e, "reply delivery failed"),
            }
        }
        if let Some(next) = batch.next_cursor.offset() {
            self.cursor.advance_past(next - 1);
        }
        Ok(delivered)
    }

    /// Poll until `cancel` fires. Transport errors are logged and retried
    /// after the configured delay.
    pub fn run(&mut self, cancel: &CancelToken) {
        info!(channel = self.channel.name(), "command loop started");
        while !cancel.is_cancelled() {
            if let Err(e) = self.poll_once() {
                warn!(error = %e, "polling for commands failed, retrying");
                if !cancel.sleep(self.settings.retry_delay) {
                    break;
                }
            }
        }
        info!("command loop stopped");
    }
}
