//! Session registry task implementation
//!
//! All session and dialogue state is owned by a single task reached via
//! message passing, so every state transition is atomic with respect to
//! both the event-dispatch task and the periodic monitor task.

use std::collections::{HashMap, HashSet};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::handle::RegistryHandle;
use super::messages::{
    AuthState, DialogueStep, Identity, LoginStart, RegistryMetrics, RegistryRequest, UserSession,
};

/// Message text tokens that must never be stored as a username
///
/// These are the button labels that start a dialogue; a stray press while
/// the bot is waiting for a username is ignored without a state change.
const RESERVED_TOKENS: &[&str] = &["Login", "Sign Up"];

/// Default request channel buffer
const CHANNEL_BUFFER: usize = 256;

/// The SessionRegistry owns all per-user authentication and dialogue state
pub struct SessionRegistry {
    tx: mpsc::Sender<RegistryRequest>,
    rx: mpsc::Receiver<RegistryRequest>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    /// Create a new registry with the default channel buffer
    pub fn new() -> Self {
        Self::with_buffer(CHANNEL_BUFFER)
    }

    /// Create a new registry with an explicit channel buffer
    pub fn with_buffer(buffer: usize) -> Self {
        let (tx, rx) = mpsc::channel(buffer);
        Self { tx, rx }
    }

    /// Get a cloneable handle to this registry
    pub fn handle(&self) -> RegistryHandle {
        RegistryHandle::new(self.tx.clone())
    }

    /// Run the registry task
    ///
    /// This consumes the registry and runs until a `Shutdown` request is
    /// received or every handle has been dropped.
    pub async fn run(mut self) {
        // Internal state - only this task ever touches it
        let mut sessions: HashMap<Identity, UserSession> = HashMap::new();
        let mut broadcast_targets: HashSet<Identity> = HashSet::new();

        info!("Session registry started");

        while let Some(req) = self.rx.recv().await {
            match req {
                RegistryRequest::IsAuthenticated { identity, reply_tx } => {
                    let authed = sessions
                        .get(&identity)
                        .is_some_and(|s| s.state == AuthState::Authenticated);
                    let _ = reply_tx.send(authed);
                }

                RegistryRequest::MarkAuthenticated { identity } => {
                    debug!(identity, "Marking identity authenticated");
                    sessions.entry(identity).or_default().state = AuthState::Authenticated;
                }

                RegistryRequest::MarkAnonymous { identity } => {
                    debug!(identity, "Marking identity anonymous");
                    sessions.entry(identity).or_default().state = AuthState::Anonymous;
                }

                RegistryRequest::RegisterForBroadcast { identity } => {
                    debug!(identity, "Registering identity for broadcast");
                    broadcast_targets.insert(identity);
                }

                RegistryRequest::BroadcastTargets { reply_tx } => {
                    let _ = reply_tx.send(broadcast_targets.clone());
                }

                RegistryRequest::BeginLogin { identity, reply_tx } => {
                    let session = sessions.entry(identity).or_default();
                    let outcome = Self::begin_login(session);
                    debug!(identity, ?outcome, "Begin login");
                    let _ = reply_tx.send(outcome);
                }

                RegistryRequest::DialogueInput {
                    identity,
                    text,
                    reply_tx,
                } => {
                    let session = sessions.entry(identity).or_default();
                    let step = Self::dialogue_step(session, text);
                    debug!(identity, ?step, "Dialogue step");
                    let _ = reply_tx.send(step);
                }

                RegistryRequest::Logout { identity, reply_tx } => {
                    let session = sessions.entry(identity).or_default();
                    let was_authenticated = session.state == AuthState::Authenticated;
                    session.state = AuthState::Anonymous;
                    if was_authenticated {
                        info!(identity, "Identity logged out");
                    } else {
                        debug!(identity, "Logout for identity that was not logged in");
                    }
                    let _ = reply_tx.send(was_authenticated);
                }

                RegistryRequest::GetMetrics { reply_tx } => {
                    let metrics = RegistryMetrics {
                        sessions: sessions.len(),
                        authenticated: sessions
                            .values()
                            .filter(|s| s.state == AuthState::Authenticated)
                            .count(),
                        mid_dialogue: sessions.values().filter(|s| s.state.mid_dialogue()).count(),
                        broadcast_targets: broadcast_targets.len(),
                    };
                    let _ = reply_tx.send(metrics);
                }

                RegistryRequest::Shutdown => {
                    info!("Session registry shutting down");
                    break;
                }
            }
        }

        info!("Session registry stopped");
    }

    /// Transition for a `BeginLogin` request
    fn begin_login(session: &mut UserSession) -> LoginStart {
        match session.state {
            AuthState::Anonymous => {
                session.state = AuthState::AwaitingUsername;
                LoginStart::Prompt
            }
            AuthState::AwaitingUsername | AuthState::AwaitingPassword { .. } => LoginStart::AlreadyPending,
            AuthState::Authenticated => LoginStart::AlreadyAuthenticated,
        }
    }

    /// Transition for free text fed into the dialogue
    ///
    /// On the password step the state is reset to `Anonymous` before the
    /// credentials are handed back, so no failure path can leave the
    /// dialogue dangling at `AwaitingPassword`.
    fn dialogue_step(session: &mut UserSession, text: String) -> DialogueStep {
        match std::mem::take(&mut session.state) {
            AuthState::AwaitingUsername => {
                if RESERVED_TOKENS.contains(&text.as_str()) {
                    warn!("Reserved token submitted as username; ignoring");
                    session.state = AuthState::AwaitingUsername;
                    return DialogueStep::Ignored;
                }
                session.state = AuthState::AwaitingPassword { username: text };
                DialogueStep::NeedPassword
            }
            AuthState::AwaitingPassword { username } => {
                // State is already Anonymous via mem::take
                DialogueStep::Credentials {
                    username,
                    password: text,
                }
            }
            other => {
                session.state = other;
                DialogueStep::NotInDialogue
            }
        }
    }
}
