//! Audit records for tool executions.

use crate::descriptor::ServerDescriptor;
use crate::util::truncate_chars;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Longest result text stored in an audit row, in characters.
pub const MAX_LOGGED_RESULT_CHARS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Success,
    Error,
}

/// One append-only row per tool execution attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallLogEntry {
    pub tool_name: String,
    pub server_url: String,
    pub server_config: Option<serde_json::Value>,
    pub arguments: serde_json::Value,
    pub status: CallStatus,
    pub result: String,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl ToolCallLogEntry {
    pub fn new(
        tool_name: &str,
        server: &ServerDescriptor,
        arguments: &serde_json::Value,
        status: CallStatus,
        result: &str,
        duration_ms: u64,
    ) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            server_url: server.url.clone(),
            server_config: server.config.clone().map(serde_json::Value::Object),
            arguments: arguments.clone(),
            status,
            result: truncate_chars(result, MAX_LOGGED_RESULT_CHARS).to_string(),
            duration_ms,
            timestamp: Utc::now(),
        }
    }
}
