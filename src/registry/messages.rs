//! Message types for the session registry

use std::collections::HashSet;

use tokio::sync::{mpsc, oneshot};

/// Opaque stable identifier for a chat-platform user
pub type Identity = i64;

/// Authentication / dialogue state for one identity
///
/// The pending username lives inside the `AwaitingPassword` variant, so it
/// can only exist while the dialogue is actually waiting for a password.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    Anonymous,
    AwaitingUsername,
    AwaitingPassword {
        username: String,
    },
    Authenticated,
}

impl AuthState {
    /// Whether a login dialogue is currently in progress
    pub fn mid_dialogue(&self) -> bool {
        matches!(self, AuthState::AwaitingUsername | AuthState::AwaitingPassword { .. })
    }
}

/// Per-identity session, created on first inbound event and never removed
#[derive(Debug, Clone, Default)]
pub struct UserSession {
    pub state: AuthState,
}

/// Outcome of a `BeginLogin` request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginStart {
    /// Dialogue moved to `AwaitingUsername`; prompt for the username
    Prompt,
    /// A login dialogue is already in progress; no state change
    AlreadyPending,
    /// The identity is already authenticated; no state change
    AlreadyAuthenticated,
}

/// Outcome of feeding free text into the dialogue state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogueStep {
    /// No dialogue in progress for this identity
    NotInDialogue,
    /// Input was a reserved command token; ignored without state change
    Ignored,
    /// Username accepted; prompt for the password
    NeedPassword,
    /// Password received. The dialogue state has been reset to `Anonymous`;
    /// the caller authenticates with these credentials and marks the
    /// identity authenticated on success.
    Credentials { username: String, password: String },
}

/// Requests handled by the registry task
#[derive(Debug)]
pub enum RegistryRequest {
    /// Check whether an identity is authenticated
    IsAuthenticated {
        identity: Identity,
        reply_tx: oneshot::Sender<bool>,
    },

    /// Transition an identity to `Authenticated`
    MarkAuthenticated { identity: Identity },

    /// Transition an identity to `Anonymous`, clearing any dialogue
    MarkAnonymous { identity: Identity },

    /// Add an identity to the broadcast target set
    RegisterForBroadcast { identity: Identity },

    /// Snapshot the broadcast target set
    BroadcastTargets {
        reply_tx: oneshot::Sender<HashSet<Identity>>,
    },

    /// Start the login dialogue for an identity
    BeginLogin {
        identity: Identity,
        reply_tx: oneshot::Sender<LoginStart>,
    },

    /// Feed free text into an in-progress login dialogue
    DialogueInput {
        identity: Identity,
        text: String,
        reply_tx: oneshot::Sender<DialogueStep>,
    },

    /// Log an identity out; replies whether it was authenticated
    Logout {
        identity: Identity,
        reply_tx: oneshot::Sender<bool>,
    },

    /// Get current metrics
    GetMetrics {
        reply_tx: oneshot::Sender<RegistryMetrics>,
    },

    /// Shut down the registry task
    Shutdown,
}

/// Registry metrics for observability
#[derive(Debug, Clone, Default)]
pub struct RegistryMetrics {
    pub sessions: usize,
    pub authenticated: usize,
    pub mid_dialogue: usize,
    pub broadcast_targets: usize,
}

/// Sender half used by handles
pub type RegistrySender = mpsc::Sender<RegistryRequest>;
