//! Error types for MCP relay calls.

use relay_types::DescriptorError;
use thiserror::Error;

/// Errors from talking to an MCP server over HTTP.
#[derive(Debug, Error)]
pub enum McpError {
    /// The server answered with a JSON-RPC error envelope.
    #[error("MCP error: {message}")]
    JsonRpc { code: i64, message: String },

    /// Non-2xx status whose body was not a JSON-RPC error.
    #[error("MCP server returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("MCP request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("MCP protocol error: {0}")]
    Protocol(String),

    #[error("Unsupported MCP response content type: '{0}'")]
    UnsupportedContentType(String),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl McpError {
    /// The HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            McpError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}
