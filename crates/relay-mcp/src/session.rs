//! Protocol session handshake and caching.
//!
//! Generic servers get one `initialize` per process per session key; the
//! resulting id is cached and reused. Managed connections are stateless from
//! our side and never handshake.

use crate::error::McpError;
use crate::transport::RpcTransport;
use relay_types::{KeyValueCache, ServerDescriptor};
use serde_json::{Value, json};
use std::sync::Arc;

/// MCP protocol version we announce.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

const SESSION_CACHE_PREFIX: &str = "session:";

/// How this relay introduces itself in `initialize`.
#[derive(Debug, Clone)]
pub struct ClientIdentity {
    pub name: String,
    pub version: String,
    pub protocol_version: String,
}

impl Default for ClientIdentity {
    fn default() -> Self {
        Self {
            name: "mcp-relay".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            protocol_version: PROTOCOL_VERSION.to_string(),
        }
    }
}

impl ClientIdentity {
    fn initialize_params(&self) -> Value {
        json!({
            "protocolVersion": self.protocol_version,
            "capabilities": { "tools": {} },
            "clientInfo": {
                "name": self.name,
                "version": self.version,
            }
        })
    }
}

/// Establishes and remembers protocol sessions.
///
/// There is no per-key lock: two concurrent first calls to the same server
/// may both handshake, and the later id overwrites the earlier one.
#[derive(Clone)]
pub struct SessionManager {
    transport: Arc<dyn RpcTransport>,
    cache: Arc<dyn KeyValueCache>,
    client: ClientIdentity,
}

impl SessionManager {
    pub fn new(
        transport: Arc<dyn RpcTransport>,
        cache: Arc<dyn KeyValueCache>,
        client: ClientIdentity,
    ) -> Self {
        Self {
            transport,
            cache,
            client,
        }
    }

    fn cache_key(server: &ServerDescriptor) -> String {
        format!("{SESSION_CACHE_PREFIX}{}", server.session_key())
    }

    /// Forget the session for `server` so the next call handshakes again.
    pub fn invalidate(&self, server: &ServerDescriptor) {
        if server.is_managed() {
            return;
        }
        self.cache.remove(&Self::cache_key(server));
        tracing::info!("MCP session for {} invalidated", server.session_key());
    }

    /// Return the session id to use for `server`, handshaking on a miss.
    ///
    /// Managed servers always yield `None`. If the server does not hand out
    /// a session id, a random one is generated and cached so later calls
    /// skip the handshake.
    pub async fn acquire(&self, server: &ServerDescriptor) -> Result<Option<String>, McpError> {
        if server.is_managed() {
            return Ok(None);
        }
        let key = Self::cache_key(server);
        if let Some(id) = self.cache.get(&key) {
            return Ok(Some(id));
        }

        let init = self
            .transport
            .call(server, "initialize", self.client.initialize_params(), None)
            .await?;
        let session_id = init
            .session_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        self.cache.put(&key, session_id.clone());
        tracing::info!("MCP session established for {}", server.session_key());

        if let Err(e) = self
            .transport
            .call(
                server,
                "notifications/initialized",
                json!({}),
                Some(&session_id),
            )
            .await
        {
            tracing::debug!(
                "notifications/initialized failed for {}: {e}",
                server.session_key()
            );
        }

        Ok(Some(session_id))
    }
}
