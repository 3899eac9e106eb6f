//! `tools/list` result parsing.

use crate::error::McpError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Information about a tool exposed by an MCP server.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct McpToolInfo {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Deserialize)]
struct ToolsListResult {
    #[serde(default)]
    tools: Vec<ToolEntry>,
}

#[derive(Deserialize)]
struct ToolEntry {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default = "default_schema", rename = "inputSchema")]
    input_schema: Value,
}

fn default_schema() -> Value {
    serde_json::json!({"type": "object", "properties": {}})
}

/// Parse a `tools/list` result. A `null` result means no tools.
pub fn parse_tool_list(result: &Value) -> Result<Vec<McpToolInfo>, McpError> {
    if result.is_null() {
        return Ok(Vec::new());
    }
    let list: ToolsListResult = serde_json::from_value(result.clone())
        .map_err(|e| McpError::Protocol(format!("Failed to parse tools/list response: {e}")))?;
    Ok(list
        .tools
        .into_iter()
        .map(|t| McpToolInfo {
            name: t.name,
            description: t.description.unwrap_or_default(),
            input_schema: t.input_schema,
        })
        .collect())
}
