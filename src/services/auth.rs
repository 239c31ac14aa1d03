//! Authentication service client
//!
//! Talks to the remote credential service: `POST /login` to check
//! credentials and `POST /add_chat_id` to register a chat for server-side
//! notifications after a successful login.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::registry::Identity;

/// Request timeout for service calls
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from the authentication / registration service
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The service answered with a non-success status
    #[error("service returned status {0}")]
    Status(u16),

    /// The service could not be reached at all
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Unreachable for a reason other than an HTTP-level failure
    #[error("service unreachable: {0}")]
    Unreachable(String),
}

impl ServiceError {
    /// Whether this was an explicit rejection rather than an outage
    ///
    /// Users see the same message either way; logs keep the distinction.
    pub fn is_rejection(&self) -> bool {
        matches!(self, ServiceError::Status(_))
    }
}

/// Client interface to the authentication service
#[async_trait]
pub trait AuthClient: Send + Sync {
    /// Check credentials; `Ok(())` means the service accepted them
    async fn login(&self, username: &str, password: &str) -> Result<(), ServiceError>;

    /// Register a chat identity for the given user on the service side
    async fn register_chat_id(&self, username: &str, chat_id: Identity) -> Result<(), ServiceError>;
}

/// HTTP implementation against the configured service base URL
pub struct HttpAuthClient {
    http: Client,
    base_url: String,
}

impl HttpAuthClient {
    /// Create a client for the given service base URL
    pub fn new(base_url: &str) -> Result<Self, ServiceError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<(), ServiceError> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Status(status.as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl AuthClient for HttpAuthClient {
    async fn login(&self, username: &str, password: &str) -> Result<(), ServiceError> {
        debug!(username, "Authenticating against remote service");
        self.post("/login", json!({ "username": username, "password": password }))
            .await
    }

    async fn register_chat_id(&self, username: &str, chat_id: Identity) -> Result<(), ServiceError> {
        match self
            .post("/add_chat_id", json!({ "username": username, "chat_id": chat_id }))
            .await
        {
            Ok(()) => {
                info!(username, chat_id, "Chat id registered with service");
                Ok(())
            }
            Err(e) => {
                warn!(username, chat_id, error = %e, "Failed to register chat id");
                Err(e)
            }
        }
    }
}
