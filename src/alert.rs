//! Alert broadcasting
//!
//! Delivers threshold-breach notifications to every registered broadcast
//! target. Delivery is best effort and independent per recipient.

use std::sync::Arc;

use eyre::Result;
use tracing::{debug, warn};

use crate::registry::RegistryHandle;
use crate::transport::ChatTransport;

/// Broadcasts alert messages to the registry's subscription set
#[derive(Clone)]
pub struct AlertDispatcher {
    registry: RegistryHandle,
    transport: Arc<dyn ChatTransport>,
}

impl AlertDispatcher {
    pub fn new(registry: RegistryHandle, transport: Arc<dyn ChatTransport>) -> Self {
        Self { registry, transport }
    }

    /// Send `message` to every broadcast target
    ///
    /// The target set is a snapshot taken at the moment of this call.
    /// A failure to deliver to one recipient is logged and never stops
    /// delivery to the rest. Returns the number of successful deliveries.
    pub async fn broadcast(&self, message: &str) -> Result<usize> {
        let targets = self.registry.broadcast_targets().await?;
        debug!(targets = targets.len(), "Broadcasting alert");

        let mut delivered = 0;
        for identity in targets {
            match self.transport.send_text(identity, message).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(identity, error = %e, "Failed to deliver alert"),
            }
        }

        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SessionRegistry;
    use crate::testutil::RecordingTransport;

    #[tokio::test]
    async fn test_broadcast_reaches_all_targets() {
        let registry = SessionRegistry::new();
        let handle = registry.handle();
        tokio::spawn(registry.run());

        handle.register_for_broadcast(1).await.unwrap();
        handle.register_for_broadcast(2).await.unwrap();

        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = AlertDispatcher::new(handle, transport.clone());

        let delivered = dispatcher.broadcast("Alert: Bin Bin-1 is 85.00% full.").await.unwrap();
        assert_eq!(delivered, 2);
        assert_eq!(transport.texts_for(1).await.len(), 1);
        assert_eq!(transport.texts_for(2).await.len(), 1);
    }

    #[tokio::test]
    async fn test_one_failed_recipient_does_not_stop_the_rest() {
        let registry = SessionRegistry::new();
        let handle = registry.handle();
        tokio::spawn(registry.run());

        for identity in [1, 2, 3] {
            handle.register_for_broadcast(identity).await.unwrap();
        }

        let transport = Arc::new(RecordingTransport::default());
        transport.fail_chat(2);
        let dispatcher = AlertDispatcher::new(handle, transport.clone());

        let delivered = dispatcher.broadcast("alert").await.unwrap();
        assert_eq!(delivered, 2);
        assert_eq!(transport.texts_for(1).await.len(), 1);
        assert!(transport.texts_for(2).await.is_empty());
        assert_eq!(transport.texts_for(3).await.len(), 1);
    }

    #[tokio::test]
    async fn test_broadcast_with_no_targets() {
        let registry = SessionRegistry::new();
        let handle = registry.handle();
        tokio::spawn(registry.run());

        let transport = Arc::new(RecordingTransport::default());
        let dispatcher = AlertDispatcher::new(handle, transport.clone());

        assert_eq!(dispatcher.broadcast("alert").await.unwrap(), 0);
        assert!(transport.sent().await.is_empty());
    }
}
