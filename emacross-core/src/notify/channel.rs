//! Notification channel trait and inbound feed types.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("channel unreachable: {0}")]
    Transport(String),

    #[error("channel rejected request (HTTP {status}): {description}")]
    Rejected { status: u16, description: String },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("notify error: {0}")]
    Other(String),
}

/// Position in the inbound feed. `None` means "from the oldest unconfirmed update".
///
/// Only ever moves forward: [`UpdateCursor::advance_past`] ignores ids behind
/// the current position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCursor(Option<i64>);

impl UpdateCursor {
    pub fn start() -> Self {
        Self(None)
    }

    pub fn offset(&self) -> Option<i64> {
        self.0
    }

    /// Move past `update_id` so it is never delivered again.
    pub fn advance_past(&mut self, update_id: i64) {
        let next = update_id + 1;
        if self.0.map_or(true, |cur| next > cur) {
            self.0 = Some(next);
        }
    }
}

/// One inbound chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub update_id: i64,
    /// Chat the message was posted in, if the update carried one.
    pub chat_id: Option<String>,
    /// Message text; `None` for stickers, joins, edits and similar.
    pub text: Option<String>,
}

/// Result of one long-poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateBatch {
    pub messages: Vec<InboundMessage>,
    /// Cursor that acknowledges every message in this batch.
    pub next_cursor: UpdateCursor,
}

/// Outbound messages plus a pull-based inbound feed.
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &str;

    /// Chat that alerts are delivered to.
    fn default_chat(&self) -> &str;

    fn send_message(&self, chat_id: &str, text: &str) -> Result<(), NotifyError>;

    /// Long-poll for messages after `cursor`, waiting at most `timeout`
    /// server-side.
    fn poll_updates(
        &self,
        cursor: UpdateCursor,
        timeout: Duration,
    ) -> Result<UpdateBatch, NotifyError>;
}
