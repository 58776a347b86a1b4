//! Error types for the service clients.

use rostersync_engine::services::ServiceError;
use thiserror::Error;

/// Result alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors raised while talking to the Directory or Provisioning service.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport failure (connect, timeout, TLS).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status without a more specific mapping.
    #[error("HTTP {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unprocessable request: {0}")]
    Unprocessable(String),

    /// Request accepted but the service reported the item as failed.
    #[error("Rejected: {0}")]
    Rejected(String),

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ClientError {
    /// The remote message without the variant prefix.
    #[must_use]
    pub fn remote_message(&self) -> String {
        match self {
            Self::Status { detail, .. } => detail.clone(),
            Self::NotFound(m)
            | Self::Conflict(m)
            | Self::Unprocessable(m)
            | Self::Rejected(m)
            | Self::AuthError(m) => m.clone(),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError(err.to_string())
    }
}

impl From<ClientError> for ServiceError {
    fn from(err: ClientError) -> Self {
        ServiceError::new(err.remote_message())
    }
}

/// Pull a human readable message out of an error body.
///
/// Directory errors carry `error.message`, Provisioning errors carry
/// `errorMessage`. Anything else is returned as-is.
pub(crate) fn extract_detail(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let candidates = [
            value.pointer("/error/message"),
            value.get("errorMessage"),
            value.get("message"),
        ];
        if let Some(message) = candidates
            .into_iter()
            .flatten()
            .find_map(serde_json::Value::as_str)
        {
            return message.to_string();
        }
    }
    body.to_string()
}
