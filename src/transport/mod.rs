//! Chat transport abstraction
//!
//! The coordinator core only speaks to chat through the [`ChatTransport`]
//! trait; the Telegram Bot API implementation lives in [`telegram`].

mod error;
mod telegram;

use std::path::Path;

use async_trait::async_trait;

pub use error::TransportError;
pub use telegram::TelegramTransport;

use crate::registry::Identity;

/// Chat identifier (for direct chats this equals the sender identity)
pub type ChatId = i64;

/// An inbound chat message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEvent {
    /// Who sent the message
    pub sender: Identity,
    /// Which chat it arrived in
    pub chat: ChatId,
    /// Message text
    pub text: String,
}

/// Outbound chat operations
///
/// Implementations must be safe to share across the event-dispatch task,
/// per-event handler tasks, and the monitor loop.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send plain text to a chat
    async fn send_text(&self, chat: ChatId, text: &str) -> Result<(), TransportError>;

    /// Send text with a one-column reply-button menu
    async fn send_menu(&self, chat: ChatId, text: &str, buttons: &[&str]) -> Result<(), TransportError>;

    /// Send text with a single inline URL button
    async fn send_url_button(
        &self,
        chat: ChatId,
        text: &str,
        label: &str,
        url: &str,
    ) -> Result<(), TransportError>;

    /// Send a file attachment
    async fn send_document(&self, chat: ChatId, path: &Path) -> Result<(), TransportError>;
}
