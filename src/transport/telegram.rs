//! Telegram Bot API transport
//!
//! Thin HTTP plumbing over the Bot API: long-polls `getUpdates` for inbound
//! messages and implements the outbound [`ChatTransport`] operations.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use super::{ChatEvent, ChatId, ChatTransport, TransportError};

/// Long-poll wait passed to getUpdates, in seconds
const POLL_TIMEOUT_SECS: u64 = 50;

/// Backoff after a failed poll before retrying
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Telegram Bot API client
pub struct TelegramTransport {
    http: Client,
    base_url: String,
}

/// Bot API response envelope
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<IncomingMessage>,
}

#[derive(Debug, Deserialize)]
struct IncomingMessage {
    from: Option<Sender>,
    chat: Chat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Sender {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

impl TelegramTransport {
    /// Create a transport for the given bot token
    pub fn new(api_base: &str, token: &str) -> Result<Self, TransportError> {
        let http = Client::builder()
            // Must sit above the getUpdates long-poll wait
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 10))
            .build()?;

        Ok(Self {
            http,
            base_url: format!("{}/bot{}", api_base.trim_end_matches('/'), token),
        })
    }

    /// Call a Bot API method with a JSON body, discarding the result payload
    async fn call(&self, method: &str, body: serde_json::Value) -> Result<(), TransportError> {
        debug!(method, "Telegram API call");
        let response = self
            .http
            .post(format!("{}/{}", self.base_url, method))
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let parsed: ApiResponse<serde_json::Value> = response.json().await?;
        if !parsed.ok {
            return Err(TransportError::Api {
                status,
                description: parsed.description.unwrap_or_else(|| "unknown error".to_string()),
            });
        }
        Ok(())
    }

    /// Fetch one batch of updates at the given offset
    async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, TransportError> {
        let response = self
            .http
            .post(format!("{}/getUpdates", self.base_url))
            .json(&json!({
                "offset": offset,
                "timeout": POLL_TIMEOUT_SECS,
                "allowed_updates": ["message"],
            }))
            .send()
            .await?;

        let status = response.status().as_u16();
        let parsed: ApiResponse<Vec<Update>> = response.json().await?;
        if !parsed.ok {
            return Err(TransportError::Api {
                status,
                description: parsed.description.unwrap_or_else(|| "unknown error".to_string()),
            });
        }
        Ok(parsed.result.unwrap_or_default())
    }

    /// Long-poll for inbound messages until shutdown is signalled
    ///
    /// Each text message becomes one [`ChatEvent`] on `events_tx`. Poll
    /// failures are logged and retried after a short delay; they never
    /// terminate the loop.
    pub async fn run_polling(
        &self,
        events_tx: mpsc::Sender<ChatEvent>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        info!("Telegram update polling started");
        let mut offset = 0i64;

        loop {
            let batch = tokio::select! {
                batch = self.get_updates(offset) => batch,
                _ = shutdown_rx.changed() => break,
            };

            match batch {
                Ok(updates) => {
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        let Some(event) = Self::event_from_update(update) else {
                            continue;
                        };
                        debug!(sender = event.sender, chat = event.chat, "Inbound chat event");
                        if events_tx.send(event).await.is_err() {
                            warn!("Event channel closed; stopping update polling");
                            return;
                        }
                    }
                }
                Err(e) => {
                    error!(error = %e, "Failed to poll for updates");
                    tokio::select! {
                        _ = tokio::time::sleep(POLL_RETRY_DELAY) => {}
                        _ = shutdown_rx.changed() => break,
                    }
                }
            }
        }

        info!("Telegram update polling stopped");
    }

    fn event_from_update(update: Update) -> Option<ChatEvent> {
        let message = update.message?;
        let sender = message.from?;
        let text = message.text?;
        Some(ChatEvent {
            sender: sender.id,
            chat: message.chat.id,
            text,
        })
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn send_text(&self, chat: ChatId, text: &str) -> Result<(), TransportError> {
        self.call("sendMessage", json!({ "chat_id": chat, "text": text })).await
    }

    async fn send_menu(&self, chat: ChatId, text: &str, buttons: &[&str]) -> Result<(), TransportError> {
        let keyboard: Vec<Vec<serde_json::Value>> =
            buttons.iter().map(|b| vec![json!({ "text": b })]).collect();

        self.call(
            "sendMessage",
            json!({
                "chat_id": chat,
                "text": text,
                "reply_markup": { "keyboard": keyboard, "resize_keyboard": true },
            }),
        )
        .await
    }

    async fn send_url_button(
        &self,
        chat: ChatId,
        text: &str,
        label: &str,
        url: &str,
    ) -> Result<(), TransportError> {
        self.call(
            "sendMessage",
            json!({
                "chat_id": chat,
                "text": text,
                "reply_markup": {
                    "inline_keyboard": [[{ "text": label, "url": url }]],
                },
            }),
        )
        .await
    }

    async fn send_document(&self, chat: ChatId, path: &Path) -> Result<(), TransportError> {
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());

        let form = reqwest::multipart::Form::new()
            .text("chat_id", chat.to_string())
            .part("document", reqwest::multipart::Part::bytes(bytes).file_name(filename));

        let response = self
            .http
            .post(format!("{}/sendDocument", self.base_url))
            .multipart(form)
            .send()
            .await?;

        let status = response.status().as_u16();
        let parsed: ApiResponse<serde_json::Value> = response.json().await?;
        if !parsed.ok {
            return Err(TransportError::Api {
                status,
                description: parsed.description.unwrap_or_else(|| "unknown error".to_string()),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_from_update() {
        let update: Update = serde_json::from_value(json!({
            "update_id": 101,
            "message": {
                "from": { "id": 42 },
                "chat": { "id": 42 },
                "text": "Login",
            }
        }))
        .unwrap();

        let event = TelegramTransport::event_from_update(update).unwrap();
        assert_eq!(
            event,
            ChatEvent {
                sender: 42,
                chat: 42,
                text: "Login".to_string()
            }
        );
    }

    #[test]
    fn test_non_text_update_is_skipped() {
        let update: Update = serde_json::from_value(json!({
            "update_id": 102,
            "message": {
                "from": { "id": 42 },
                "chat": { "id": 42 },
            }
        }))
        .unwrap();
        assert!(TelegramTransport::event_from_update(update).is_none());

        let update: Update = serde_json::from_value(json!({ "update_id": 103 })).unwrap();
        assert!(TelegramTransport::event_from_update(update).is_none());
    }

    #[test]
    fn test_api_response_error_envelope() {
        let parsed: ApiResponse<Vec<Update>> = serde_json::from_value(json!({
            "ok": false,
            "description": "Unauthorized",
        }))
        .unwrap();
        assert!(!parsed.ok);
        assert_eq!(parsed.description.as_deref(), Some("Unauthorized"));
        assert!(parsed.result.is_none());
    }

    #[test]
    fn test_base_url_includes_token() {
        let transport = TelegramTransport::new("https://api.telegram.org/", "123:abc").unwrap();
        assert_eq!(transport.base_url, "https://api.telegram.org/bot123:abc");
    }
}
