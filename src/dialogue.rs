//! Login dialogue driver
//!
//! Walks one identity through the username/password conversation. The
//! state transitions themselves happen inside the session registry task
//! (one atomic message per step); this module performs the surrounding
//! I/O: prompts, the remote credential check, and session registration.

use std::sync::Arc;

use eyre::Result;
use tracing::{info, warn};

use crate::registry::{DialogueStep, Identity, LoginStart, RegistryHandle};
use crate::services::AuthClient;
use crate::transport::{ChatId, ChatTransport};

pub const PROMPT_USERNAME: &str = "Please enter your username:";
pub const PROMPT_PASSWORD: &str = "Please enter your password:";
pub const MSG_INVALID_CREDENTIALS: &str = "Invalid username or password. Please try again.";
pub const MSG_LOGIN_PENDING: &str = "A login is already in progress.";
pub const MSG_ALREADY_LOGGED_IN: &str = "You are already logged in.";
pub const MSG_LOGGED_OUT: &str = "You have been logged out.";
pub const MSG_NOT_LOGGED_IN: &str = "You are not logged in.";

/// What the router should do after feeding text to the dialogue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogueReply {
    /// No dialogue was in progress; fall back to the help prompt
    NotInDialogue,
    /// The dialogue consumed the input
    Handled,
    /// Login completed; the caller renders the main menu
    LoggedIn { username: String },
}

/// Drives the login conversation for all identities
pub struct AuthDialogue {
    registry: RegistryHandle,
    auth: Arc<dyn AuthClient>,
    transport: Arc<dyn ChatTransport>,
}

impl AuthDialogue {
    pub fn new(registry: RegistryHandle, auth: Arc<dyn AuthClient>, transport: Arc<dyn ChatTransport>) -> Self {
        Self {
            registry,
            auth,
            transport,
        }
    }

    /// Handle the "Login" button
    pub async fn begin_login(&self, identity: Identity, chat: ChatId) -> Result<()> {
        let message = match self.registry.begin_login(identity).await? {
            LoginStart::Prompt => PROMPT_USERNAME,
            LoginStart::AlreadyPending => MSG_LOGIN_PENDING,
            LoginStart::AlreadyAuthenticated => MSG_ALREADY_LOGGED_IN,
        };
        self.transport.send_text(chat, message).await?;
        Ok(())
    }

    /// Feed free text into an in-progress dialogue
    pub async fn handle_text(&self, identity: Identity, chat: ChatId, text: &str) -> Result<DialogueReply> {
        match self.registry.dialogue_input(identity, text).await? {
            DialogueStep::NotInDialogue => Ok(DialogueReply::NotInDialogue),
            DialogueStep::Ignored => Ok(DialogueReply::Handled),
            DialogueStep::NeedPassword => {
                self.transport.send_text(chat, PROMPT_PASSWORD).await?;
                Ok(DialogueReply::Handled)
            }
            DialogueStep::Credentials { username, password } => {
                self.finish_login(identity, chat, username, &password).await
            }
        }
    }

    /// Run the credential check and complete or reject the login
    ///
    /// The registry has already reset the dialogue to anonymous, so every
    /// path out of here leaves the state machine in a defined place.
    async fn finish_login(
        &self,
        identity: Identity,
        chat: ChatId,
        username: String,
        password: &str,
    ) -> Result<DialogueReply> {
        match self.auth.login(&username, password).await {
            Ok(()) => {
                self.registry.mark_authenticated(identity).await?;
                self.registry.register_for_broadcast(identity).await?;
                info!(identity, username, "Login succeeded");

                // Server-side registration is best effort; already logged
                // by the client on failure
                let _ = self.auth.register_chat_id(&username, identity).await;

                self.transport
                    .send_text(chat, &format!("Welcome, {}! You are now logged in.", username))
                    .await?;
                Ok(DialogueReply::LoggedIn { username })
            }
            Err(e) => {
                // One user-facing message for both causes; the log keeps
                // rejection and outage apart
                if e.is_rejection() {
                    info!(identity, username, error = %e, "Credentials rejected");
                } else {
                    warn!(identity, username, error = %e, "Authentication service unreachable");
                }
                self.transport.send_text(chat, MSG_INVALID_CREDENTIALS).await?;
                Ok(DialogueReply::Handled)
            }
        }
    }

    /// Handle `/logout`
    pub async fn logout(&self, identity: Identity, chat: ChatId) -> Result<()> {
        let message = if self.registry.logout(identity).await? {
            MSG_LOGGED_OUT
        } else {
            MSG_NOT_LOGGED_IN
        };
        self.transport.send_text(chat, message).await?;
        Ok(())
    }
}
