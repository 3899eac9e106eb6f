//! Audited tool execution.

use crate::error::McpError;
use crate::result::normalize_tool_result;
use crate::session::{ClientIdentity, SessionManager};
use crate::transport::RpcTransport;
use relay_types::{AuditLog, CallStatus, KeyValueCache, ServerDescriptor, ToolCallLogEntry};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Instant;

/// Runs `tools/call` against any server and records every attempt.
#[derive(Clone)]
pub struct ToolExecutor {
    transport: Arc<dyn RpcTransport>,
    sessions: SessionManager,
    audit: Arc<dyn AuditLog>,
}

impl ToolExecutor {
    pub fn new(
        transport: Arc<dyn RpcTransport>,
        cache: Arc<dyn KeyValueCache>,
        audit: Arc<dyn AuditLog>,
        client: ClientIdentity,
    ) -> Self {
        let sessions = SessionManager::new(transport.clone(), cache, client);
        Self {
            transport,
            sessions,
            audit,
        }
    }

    /// Execute a tool and return its text, or `"Error: <message>"`.
    ///
    /// Never fails. Exactly one audit row is appended per invocation; a
    /// failure to write it is logged and otherwise ignored.
    pub async fn execute(&self, server: &ServerDescriptor, tool_name: &str, arguments: Value) -> String {
        let started = Instant::now();
        let outcome = self.invoke(server, tool_name, &arguments).await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let (status, logged, returned) = match outcome {
            Ok(text) => (CallStatus::Success, text.clone(), text),
            Err(e) => {
                let message = e.to_string();
                tracing::warn!("Tool '{tool_name}' on {} failed: {message}", server.url);
                (CallStatus::Error, message.clone(), format!("Error: {message}"))
            }
        };

        let entry = ToolCallLogEntry::new(tool_name, server, &arguments, status, &logged, duration_ms);
        if let Err(e) = self.audit.append(entry).await {
            tracing::warn!("Failed to record tool call for '{tool_name}': {e}");
        }

        tracing::debug!("Tool '{tool_name}' finished in {duration_ms}ms");
        returned
    }

    async fn invoke(
        &self,
        server: &ServerDescriptor,
        tool_name: &str,
        arguments: &Value,
    ) -> Result<String, McpError> {
        server.kind()?;
        let session_id = self.sessions.acquire(server).await?;
        let params = json!({
            "name": tool_name,
            "arguments": arguments,
        });
        let response = match self
            .transport
            .call(server, "tools/call", params, session_id.as_deref())
            .await
        {
            Ok(response) => response,
            Err(e) => {
                // Streamable HTTP answers 404 for an expired session.
                if session_id.is_some() && e.status() == Some(404) {
                    self.sessions.invalidate(server);
                }
                return Err(e);
            }
        };
        Ok(normalize_tool_result(&response.result))
    }
}
