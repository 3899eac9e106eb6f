//! Error types for the connection lifecycle.

use relay_mcp::McpError;
use relay_types::{AuthError, ConfigError, StoreError};
use thiserror::Error;

/// Secret that authenticates calls to the provider's REST API.
pub const PROVIDER_KEY_NAME: &str = "SMITHERY_API_KEY";

/// Failures talking to the provider's REST API.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Smithery API key not configured")]
    MissingApiKey,

    #[error("Smithery API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed Smithery response: {0}")]
    Malformed(String),
}

/// Errors surfaced by lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Caller input failed validation.
    #[error("{0}")]
    InvalidInput(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Provider refused or failed; message already carries its context.
    #[error("{0}")]
    Provider(String),

    #[error(transparent)]
    Transport(#[from] McpError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LifecycleError {
    /// Wrap a provider failure with the operation it interrupted.
    ///
    /// A missing API key is a configuration problem, not a provider one.
    pub fn provider(context: &str, err: ProviderError) -> Self {
        match err {
            ProviderError::MissingApiKey => LifecycleError::Config(ConfigError::MissingKey {
                key: PROVIDER_KEY_NAME.to_string(),
            }),
            ProviderError::Status { body, .. } => {
                LifecycleError::Provider(format!("{context}: {body}"))
            }
            other => LifecycleError::Provider(format!("{context}: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_failure_quotes_body() {
        let err = LifecycleError::provider(
            "Smithery connection failed",
            ProviderError::Status {
                status: 422,
                body: "bad url".into(),
            },
        );
        assert_eq!(err.to_string(), "Smithery connection failed: bad url");
    }

    #[test]
    fn missing_key_is_config() {
        let err = LifecycleError::provider("Retry failed", ProviderError::MissingApiKey);
        assert!(matches!(err, LifecycleError::Config(_)));
        assert!(err.to_string().contains("SMITHERY_API_KEY"));
    }

    #[test]
    fn network_failure_keeps_detail() {
        let err = LifecycleError::provider("Retry failed", ProviderError::Network("reset".into()));
        assert_eq!(err.to_string(), "Retry failed: Network error: reset");
    }
}
