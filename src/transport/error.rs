//! Transport error types

use thiserror::Error;

/// Errors that can occur talking to the chat platform
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("chat API error {status}: {description}")]
    Api { status: u16, description: String },

    #[error("attachment error: {0}")]
    Attachment(#[from] std::io::Error),
}

impl TransportError {
    /// Whether the failure came from the network rather than the API
    pub fn is_network(&self) -> bool {
        matches!(self, TransportError::Network(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = TransportError::Api {
            status: 403,
            description: "bot was blocked by the user".to_string(),
        };
        assert_eq!(err.to_string(), "chat API error 403: bot was blocked by the user");
        assert!(!err.is_network());
    }
}
