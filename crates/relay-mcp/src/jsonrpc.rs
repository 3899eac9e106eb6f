//! JSON-RPC 2.0 envelopes as spoken by streamable-HTTP MCP servers.

use crate::error::McpError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A JSON-RPC 2.0 request with a string id.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: String,
    pub method: String,
    pub params: Value,
}

impl JsonRpcRequest {
    pub fn new(id: impl Into<String>, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 response. Ids are echoed back as-is and not checked.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl From<JsonRpcError> for McpError {
    fn from(err: JsonRpcError) -> Self {
        McpError::JsonRpc {
            code: err.code,
            message: err.message,
        }
    }
}

impl JsonRpcResponse {
    /// Unwrap the envelope: an error object wins, a missing result is `null`.
    pub fn into_result(self) -> Result<Value, McpError> {
        if let Some(err) = self.error {
            return Err(err.into());
        }
        Ok(self.result.unwrap_or(Value::Null))
    }
}

/// Convert a raw `error` member into an [`McpError`], tolerating odd shapes.
pub(crate) fn error_from_value(value: &Value) -> McpError {
    match serde_json::from_value::<JsonRpcError>(value.clone()) {
        Ok(err) if !err.message.is_empty() => err.into(),
        _ => McpError::JsonRpc {
            code: 0,
            message: value.to_string(),
        },
    }
}
