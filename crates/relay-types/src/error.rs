//! Error hierarchy shared across the relay crates.

use thiserror::Error;

/// Errors from configuration loading and required-secret lookups.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file parse error at {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Missing required configuration: {key}")]
    MissingKey { key: String },

    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors from the persistence collaborators (connection store, audit log).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Errors from verifying a caller's bearer credential.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingHeader,

    #[error("Invalid user token")]
    InvalidToken,

    #[error("Identity service error: {0}")]
    Backend(String),
}

/// A server descriptor that cannot be routed anywhere.
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("Managed server '{url}' is missing a namespace or connectionId")]
    IncompleteManaged { url: String },

    #[error("Server descriptor has an empty url")]
    EmptyUrl,
}
