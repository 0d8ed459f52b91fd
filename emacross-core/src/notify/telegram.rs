//! Telegram Bot API client.
//!
//! Outbound: `POST /bot{token}/sendMessage` (form-encoded).
//! Inbound: `GET /bot{token}/getUpdates?timeout=&offset=` long-poll.
//!
//! Delivery is best-effort: no retries, no rate-limit handling. Callers log
//! failures and move on.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use super::channel::{InboundMessage, NotificationChannel, NotifyError, UpdateBatch, UpdateCursor};

/// Extra HTTP timeout on top of the server-side long-poll wait.
const LONG_POLL_GRACE: Duration = Duration::from_secs(20);

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    chat: Option<Chat>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

/// Connection settings for the Bot API.
#[derive(Debug, Clone)]
pub struct TelegramSettings {
    pub api_url: String,
    pub bot_token: String,
    pub chat_id: String,
    pub parse_mode: Option<String>,
    pub request_timeout: Duration,
}

impl TelegramSettings {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            api_url: "https://api.telegram.org".into(),
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
            parse_mode: Some("HTML".into()),
            request_timeout: Duration::from_secs(30),
        }
    }
}

pub struct TelegramBot {
    client: reqwest::blocking::Client,
    settings: TelegramSettings,
}

impl TelegramBot {
    pub fn new(settings: TelegramSettings) -> Result<Self, NotifyError> {
        // Per-request timeouts are set on each call; long-polls need more
        // than plain sends.
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| NotifyError::Other(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, settings })
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.settings.api_url.trim_end_matches('/'),
            self.settings.bot_token
        )
    }

    /// Map a transport error without leaking the token embedded in the URL.
    fn transport(e: reqwest::Error) -> NotifyError {
        NotifyError::Transport(e.without_url().to_string())
    }

    /// Decode an API envelope, turning `ok: false` or non-2xx into `Rejected`.
    fn decode<T: serde::de::DeserializeOwned>(
        status: reqwest::StatusCode,
        body: &str,
    ) -> Result<T, NotifyError> {
        let parsed: ApiResponse<T> = match serde_json::from_str(body) {
            Ok(parsed) => parsed,
            Err(e) if status.is_success() => {
                return Err(NotifyError::ResponseFormatChanged(e.to_string()))
            }
            Err(_) => {
                return Err(NotifyError::Rejected {
                    status: status.as_u16(),
                    description: body.trim().to_string(),
                })
            }
        };

        if !status.is_success() || !parsed.ok {
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                description: parsed.description.unwrap_or_default(),
            });
        }

        parsed
            .result
            .ok_or_else(|| NotifyError::ResponseFormatChanged("ok response without result".into()))
    }

    fn batch_from_updates(updates: Vec<Update>, cursor: UpdateCursor) -> UpdateBatch {
        let mut next_cursor = cursor;
        let messages = updates
            .into_iter()
            .map(|u| {
                next_cursor.advance_past(u.update_id);
                let (chat_id, text) = match u.message {
                    Some(m) => (m.chat.map(|c| c.id.to_string()), m.text),
                    None => (None, None),
                };
                InboundMessage {
                    update_id: u.update_id,
                    chat_id,
                    text,
                }
            })
            .collect();
        UpdateBatch {
            messages,
            next_cursor,
        }
    }
}

impl NotificationChannel for TelegramBot {
    fn name(&self) -> &str {
        "telegram"
    }

    fn default_chat(&self) -> &str {
        &self.settings.chat_id
    }

    fn send_message(&self, chat_id: &str, text: &str) -> Result<(), NotifyError> {
        let mut form = vec![("chat_id", chat_id), ("text", text)];
        if let Some(mode) = self.settings.parse_mode.as_deref() {
            form.push(("parse_mode", mode));
        }

        let resp = self
            .client
            .post(self.method_url("sendMessage"))
            .timeout(self.settings.request_timeout)
            .form(&form)
            .send()
            .map_err(Self::transport)?;
        let status = resp.status();
        let body = resp.text().map_err(Self::transport)?;
        let _: serde_json::Value = Self::decode(status, &body)?;
        debug!(chat_id, "message delivered");
        Ok(())
    }

    fn poll_updates(
        &self,
        cursor: UpdateCursor,
        timeout: Duration,
    ) -> Result<UpdateBatch, NotifyError> {
        let mut query = vec![("timeout", timeout.as_secs().to_string())];
        if let Some(offset) = cursor.offset() {
            query.push(("offset", offset.to_string()));
        }

        let resp = self
            .client
            .get(self.method_url("getUpdates"))
            .timeout(timeout + LONG_POLL_GRACE)
            .query(&query)
            .send()
            .map_err(Self::transport)?;
        let status = resp.status();
        let body = resp.text().map_err(Self::transport)?;
        let updates: Vec<Update> = Self::decode(status, &body)?;
        Ok(Self::batch_from_updates(updates, cursor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bot() -> TelegramBot {
        TelegramBot::new(TelegramSettings::new("123:abc", "-1001")).unwrap()
    }

    #[test]
    fn method_url_embeds_token() {
        assert_eq!(
            bot().method_url("getUpdates"),
            "https://api.telegram.org/bot123:abc/getUpdates"
        );
    }

    #[test]
    fn decodes_updates_and_advances_cursor() {
        let body = r#"{"ok":true,"result":[
            {"update_id":10,"message":{"chat":{"id":-1001},"text":"/price btcusdm"}},
            {"update_id":11,"edited_message":{"text":"ignored"}},
            {"update_id":12,"message":{"chat":{"id":42}}}
        ]}"#;
        let updates: Vec<Update> = TelegramBot::decode(reqwest::StatusCode::OK, body).unwrap();
        let batch = TelegramBot::batch_from_updates(updates, UpdateCursor::start());

        assert_eq!(batch.messages.len(), 3);
        assert_eq!(batch.messages[0].chat_id.as_deref(), Some("-1001"));
        assert_eq!(batch.messages[0].text.as_deref(), Some("/price btcusdm"));
        assert_eq!(batch.messages[1].text, None);
        assert_eq!(batch.messages[2].chat_id.as_deref(), Some("42"));
        assert_eq!(batch.next_cursor.offset(), Some(13));
    }

    #[test]
    fn empty_result_keeps_cursor() {
        let mut start = UpdateCursor::start();
        start.advance_past(5);
        let updates: Vec<Update> =
            TelegramBot::decode(reqwest::StatusCode::OK, r#"{"ok":true,"result":[]}"#).unwrap();
        let batch = TelegramBot::batch_from_updates(updates, start);
        assert!(batch.messages.is_empty());
        assert_eq!(batch.next_cursor, start);
    }

    #[test]
    fn api_error_is_rejected() {
        let body = r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#;
        let err = TelegramBot::decode::<serde_json::Value>(reqwest::StatusCode::BAD_REQUEST, body)
            .unwrap_err();
        assert!(matches!(
            err,
            NotifyError::Rejected { status: 400, ref description } if description.contains("chat not found")
        ));
    }

    #[test]
    fn non_json_error_body_is_rejected() {
        let err = TelegramBot::decode::<serde_json::Value>(
            reqwest::StatusCode::BAD_GATEWAY,
            "<html>bad gateway</html>",
        )
        .unwrap_err();
        assert!(matches!(err, NotifyError::Rejected { status: 502, .. }));
    }

    #[test]
    fn garbage_success_body_is_format_change() {
        let err = TelegramBot::decode::<serde_json::Value>(reqwest::StatusCode::OK, "not json")
            .unwrap_err();
        assert!(matches!(err, NotifyError::ResponseFormatChanged(_)));
    }

    #[test]
    fn ok_without_result_is_format_change() {
        let err = TelegramBot::decode::<Vec<Update>>(reqwest::StatusCode::OK, r#"{"ok":true}"#)
            .unwrap_err();
        assert!(matches!(err, NotifyError::ResponseFormatChanged(_)));
    }

    #[test]
    fn default_chat_comes_from_settings() {
        assert_eq!(bot().default_chat(), "-1001");
        assert_eq!(bot().name(), "telegram");
    }
}
