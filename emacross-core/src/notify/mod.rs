//! Chat notifications: the channel abstraction and the Telegram client.

pub mod channel;
pub mod telegram;

pub use channel::{InboundMessage, NotificationChannel, NotifyError, UpdateBatch, UpdateCursor};
pub use telegram::{TelegramBot, TelegramSettings};
