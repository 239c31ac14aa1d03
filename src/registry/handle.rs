//! RegistryHandle - client interface to the session registry task

use std::collections::HashSet;

use eyre::{Result, eyre};
use tokio::sync::oneshot;

use super::messages::{DialogueStep, Identity, LoginStart, RegistryMetrics, RegistryRequest, RegistrySender};

/// Handle for interacting with the session registry
///
/// Cloneable; both the event-dispatch path and the monitor loop hold one.
/// All operations are async and resolve against the single owning task.
#[derive(Clone)]
pub struct RegistryHandle {
    tx: RegistrySender,
}

impl RegistryHandle {
    pub(crate) fn new(tx: RegistrySender) -> Self {
        Self { tx }
    }

    async fn send(&self, req: RegistryRequest) -> Result<()> {
        self.tx
            .send(req)
            .await
            .map_err(|_| eyre!("Session registry channel closed"))
    }

    /// Check whether an identity is authenticated
    pub async fn is_authenticated(&self, identity: Identity) -> Result<bool> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RegistryRequest::IsAuthenticated { identity, reply_tx }).await?;
        reply_rx.await.map_err(|_| eyre!("Session registry dropped reply"))
    }

    /// Transition an identity to `Authenticated`
    pub async fn mark_authenticated(&self, identity: Identity) -> Result<()> {
        self.send(RegistryRequest::MarkAuthenticated { identity }).await
    }

    /// Transition an identity to `Anonymous`
    pub async fn mark_anonymous(&self, identity: Identity) -> Result<()> {
        self.send(RegistryRequest::MarkAnonymous { identity }).await
    }

    /// Add an identity to the broadcast target set
    pub async fn register_for_broadcast(&self, identity: Identity) -> Result<()> {
        self.send(RegistryRequest::RegisterForBroadcast { identity }).await
    }

    /// Snapshot the broadcast target set
    pub async fn broadcast_targets(&self) -> Result<HashSet<Identity>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RegistryRequest::BroadcastTargets { reply_tx }).await?;
        reply_rx.await.map_err(|_| eyre!("Session registry dropped reply"))
    }

    /// Start the login dialogue for an identity
    pub async fn begin_login(&self, identity: Identity) -> Result<LoginStart> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RegistryRequest::BeginLogin { identity, reply_tx }).await?;
        reply_rx.await.map_err(|_| eyre!("Session registry dropped reply"))
    }

    /// Feed free text into an in-progress login dialogue
    pub async fn dialogue_input(&self, identity: Identity, text: &str) -> Result<DialogueStep> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RegistryRequest::DialogueInput {
            identity,
            text: text.to_string(),
            reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| eyre!("Session registry dropped reply"))
    }

    /// Log an identity out; returns whether it was authenticated
    pub async fn logout(&self, identity: Identity) -> Result<bool> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RegistryRequest::Logout { identity, reply_tx }).await?;
        reply_rx.await.map_err(|_| eyre!("Session registry dropped reply"))
    }

    /// Get current registry metrics
    pub async fn metrics(&self) -> Result<RegistryMetrics> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RegistryRequest::GetMetrics { reply_tx }).await?;
        reply_rx.await.map_err(|_| eyre!("Session registry dropped reply"))
    }

    /// Request shutdown of the registry task
    pub async fn shutdown(&self) -> Result<()> {
        self.send(RegistryRequest::Shutdown).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_closed_channel_is_an_error() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let handle = RegistryHandle::new(tx);
        assert!(handle.is_authenticated(1).await.is_err());
        assert!(handle.mark_authenticated(1).await.is_err());
        assert!(handle.broadcast_targets().await.is_err());
    }
}
