//! Create, list, re-check and remove provider-managed connections.
//!
//! The provider is the source of truth for connection status; the local
//! store is a mirror that every operation brings back in line. Operations
//! that are only advisory (post-create verification, list sync, remote
//! delete, per-server tool listing) return their own `Result`, which the
//! caller logs and drops.

use crate::error::{LifecycleError, PROVIDER_KEY_NAME};
use crate::namespace::NamespaceResolver;
use crate::provider::{ConnectionProvider, NewConnection, TokenRequest};
use chrono::Utc;
use relay_mcp::{McpError, McpToolInfo, RpcTransport, parse_tool_list};
use relay_types::{
    CallerIdentity, ConfigError, ConnectionStatus, ConnectionStore, ManagedConnection,
    ServerDescriptor,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

/// Failure message prefixes reported to callers.
const CREATE_FAILED: &str = "Smithery connection failed";
const RETRY_FAILED: &str = "Retry failed";
const NAMESPACE_FAILED: &str = "Namespace resolution failed";
const TOKEN_FAILED: &str = "Smithery token creation failed";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConnection {
    #[serde(default)]
    pub mcp_url: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOutcome {
    pub connection_id: String,
    pub status: ConnectionStatus,
    pub authorization_url: Option<String>,
    pub server_info: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusOutcome {
    pub connection_id: String,
    pub status: ConnectionStatus,
    pub authorization_url: Option<String>,
}

/// A tool offered by one of the caller's connected servers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogTool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub server_name: String,
    pub connection_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSummary {
    pub connection_id: String,
    pub display_name: String,
    pub tool_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ToolCatalog {
    pub tools: Vec<CatalogTool>,
    pub servers: Vec<ServerSummary>,
}

/// `token` is always present (possibly `null`); the rest only when set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenOutcome {
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Mirrors provider-managed connections into the local store.
#[derive(Clone)]
pub struct ConnectionManager {
    provider: Arc<dyn ConnectionProvider>,
    store: Arc<dyn ConnectionStore>,
    transport: Arc<dyn RpcTransport>,
    namespaces: NamespaceResolver,
    token_ttl_secs: u64,
}

fn require(value: &str, message: &str) -> Result<(), LifecycleError> {
    if value.trim().is_empty() {
        return Err(LifecycleError::InvalidInput(message.to_string()));
    }
    Ok(())
}

impl ConnectionManager {
    pub fn new(
        provider: Arc<dyn ConnectionProvider>,
        store: Arc<dyn ConnectionStore>,
        transport: Arc<dyn RpcTransport>,
        namespaces: NamespaceResolver,
        token_ttl_secs: u64,
    ) -> Self {
        Self {
            provider,
            store,
            transport,
            namespaces,
            token_ttl_secs,
        }
    }

    async fn resolve_namespace(&self) -> Result<String, LifecycleError> {
        self.namespaces
            .resolve()
            .await
            .map_err(|e| LifecycleError::provider(NAMESPACE_FAILED, e))
    }

    /// Namespace of a stored connection, else the resolved namespace.
    async fn namespace_for(
        &self,
        caller: &CallerIdentity,
        connection_id: &str,
    ) -> Result<String, LifecycleError> {
        let stored = self
            .store
            .list(&caller.id)
            .await?
            .into_iter()
            .find(|c| c.connection_id == connection_id);
        match stored {
            Some(row) => Ok(row.namespace),
            None => self.resolve_namespace().await,
        }
    }

    /// `tools/list` through the provider's relay for one connection.
    async fn fetch_tools(
        &self,
        namespace: &str,
        connection_id: &str,
    ) -> Result<Vec<McpToolInfo>, McpError> {
        let server = ServerDescriptor::managed(namespace, connection_id);
        let response = self
            .transport
            .call(&server, "tools/list", json!({}), None)
            .await?;
        parse_tool_list(&response.result)
    }

    /// Register a new connection and persist it.
    ///
    /// A `connected` reply is double-checked with `tools/list`; if that
    /// fails and a re-fetch says `auth_required`, the connection is recorded
    /// as such with the re-fetched authorization URL.
    pub async fn create(
        &self,
        caller: &CallerIdentity,
        request: CreateConnection,
    ) -> Result<CreateOutcome, LifecycleError> {
        if request.mcp_url.trim().is_empty() || request.display_name.trim().is_empty() {
            return Err(LifecycleError::InvalidInput(
                "mcpUrl and displayName are required".into(),
            ));
        }

        let namespace = self.resolve_namespace().await?;
        let connection_id = format!("{}-{}", caller.id, Utc::now().timestamp_millis());
        let registration = NewConnection {
            mcp_url: request.mcp_url.clone(),
            display_name: request.display_name.clone(),
            caller_id: caller.id.clone(),
        };
        let created = self
            .provider
            .put_connection(&namespace, &connection_id, &registration)
            .await
            .map_err(|e| LifecycleError::provider(CREATE_FAILED, e))?;

        let mut status = created.status;
        let mut authorization_url = created.authorization_url;

        if status.is_connected() {
            if let Err(e) = self.fetch_tools(&namespace, &connection_id).await {
                tracing::warn!("Verification of new connection {connection_id} failed: {e}");
                match self.provider.get_connection(&namespace, &connection_id).await {
                    Ok(current) if current.status == ConnectionStatus::AuthRequired => {
                        status = ConnectionStatus::AuthRequired;
                        authorization_url = current.authorization_url.or(authorization_url);
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!("Re-fetch of connection {connection_id} failed: {e}"),
                }
            }
        }

        let now = Utc::now();
        self.store
            .upsert(ManagedConnection {
                caller_id: caller.id.clone(),
                connection_id: connection_id.clone(),
                namespace,
                mcp_url: request.mcp_url,
                display_name: request.display_name,
                status: status.clone(),
                authorization_url: authorization_url.clone(),
                created_at: now,
                updated_at: now,
            })
            .await?;

        tracing::info!("Created connection {connection_id} ({status})");
        Ok(CreateOutcome {
            connection_id,
            status,
            authorization_url,
            server_info: created.server_info,
        })
    }

    /// Pull provider status into the store. Returns how many rows changed.
    pub async fn sync(&self, caller: &CallerIdentity) -> Result<usize, LifecycleError> {
        let namespace = self.resolve_namespace().await?;
        let remote = self
            .provider
            .list_connections(&namespace, &caller.id)
            .await
            .map_err(|e| LifecycleError::provider("Listing connections failed", e))?;
        let local = self.store.list(&caller.id).await?;

        let mut changed = 0;
        for conn in remote {
            let Some(row) = local.iter().find(|r| r.connection_id == conn.connection_id) else {
                continue;
            };
            if row.status == conn.status && row.authorization_url == conn.authorization_url {
                continue;
            }
            if self
                .store
                .update_status(
                    &caller.id,
                    &conn.connection_id,
                    conn.status.clone(),
                    conn.authorization_url.clone(),
                )
                .await?
            {
                tracing::info!(
                    "Connection {} changed {} -> {}",
                    conn.connection_id,
                    row.status,
                    conn.status
                );
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// The caller's stored connections, newest first, after a best-effort sync.
    pub async fn list(&self, caller: &CallerIdentity) -> Result<Vec<ManagedConnection>, LifecycleError> {
        if let Err(e) = self.sync(caller).await {
            tracing::warn!("Connection sync for {} failed: {e}", caller.id);
        }
        Ok(self.store.list(&caller.id).await?)
    }

    /// Re-check a connection after the caller finished authorization.
    pub async fn retry(
        &self,
        caller: &CallerIdentity,
        connection_id: &str,
    ) -> Result<StatusOutcome, LifecycleError> {
        self.refresh_status(caller, connection_id).await
    }

    /// Health-check a connection. Same behavior as [`Self::retry`].
    pub async fn verify(
        &self,
        caller: &CallerIdentity,
        connection_id: &str,
    ) -> Result<StatusOutcome, LifecycleError> {
        self.refresh_status(caller, connection_id).await
    }

    async fn refresh_status(
        &self,
        caller: &CallerIdentity,
        connection_id: &str,
    ) -> Result<StatusOutcome, LifecycleError> {
        require(connection_id, "connectionId is required")?;
        let namespace = self.namespace_for(caller, connection_id).await?;
        let current = self
            .provider
            .get_connection(&namespace, connection_id)
            .await
            .map_err(|e| LifecycleError::provider(RETRY_FAILED, e))?;

        let updated = self
            .store
            .update_status(
                &caller.id,
                connection_id,
                current.status.clone(),
                current.authorization_url.clone(),
            )
            .await?;
        if !updated {
            tracing::debug!("No stored row for connection {connection_id}");
        }

        Ok(StatusOutcome {
            connection_id: connection_id.to_string(),
            status: current.status,
            authorization_url: current.authorization_url,
        })
    }

    /// Delete a connection locally, and on the provider if it can be reached.
    pub async fn remove(&self, caller: &CallerIdentity, connection_id: &str) -> Result<(), LifecycleError> {
        require(connection_id, "connectionId is required")?;

        match self.namespace_for(caller, connection_id).await {
            Ok(namespace) => {
                if let Err(e) = self.provider.delete_connection(&namespace, connection_id).await {
                    tracing::warn!("Provider delete of {connection_id} failed (non-fatal): {e}");
                }
            }
            Err(e) => tracing::warn!("Skipping provider delete of {connection_id}: {e}"),
        }

        if self.store.delete(&caller.id, connection_id).await? {
            tracing::info!("Removed connection {connection_id}");
        }
        Ok(())
    }

    /// Tools of every connected server in the resolved namespace.
    pub async fn list_tools(&self, caller: &CallerIdentity) -> Result<ToolCatalog, LifecycleError> {
        if !self.provider.is_configured() {
            return Err(ConfigError::MissingKey {
                key: PROVIDER_KEY_NAME.to_string(),
            }
            .into());
        }

        let namespace = self.resolve_namespace().await?;
        let connections: Vec<ManagedConnection> = self
            .store
            .list(&caller.id)
            .await?
            .into_iter()
            .filter(|c| c.status.is_connected() && c.namespace == namespace)
            .collect();

        let mut catalog = ToolCatalog::default();
        for conn in connections {
            let tools = match self.fetch_tools(&conn.namespace, &conn.connection_id).await {
                Ok(tools) => tools,
                Err(e) => {
                    tracing::warn!("tools/list failed for {}: {e}", conn.display_name);
                    continue;
                }
            };
            catalog.servers.push(ServerSummary {
                connection_id: conn.connection_id.clone(),
                display_name: conn.display_name.clone(),
                tool_count: tools.len(),
            });
            catalog.tools.extend(tools.into_iter().map(|t| CatalogTool {
                description: if t.description.is_empty() {
                    t.name.clone()
                } else {
                    t.description
                },
                name: t.name,
                input_schema: t.input_schema,
                server_name: conn.display_name.clone(),
                connection_id: conn.connection_id.clone(),
            }));
        }
        Ok(catalog)
    }

    /// Mint a provider token scoped to the caller's connected namespaces.
    pub async fn mint_token(&self, caller: &CallerIdentity) -> Result<TokenOutcome, LifecycleError> {
        if !self.provider.is_configured() {
            return Err(ConfigError::MissingKey {
                key: PROVIDER_KEY_NAME.to_string(),
            }
            .into());
        }

        let mut namespaces: Vec<String> = Vec::new();
        for conn in self.store.list(&caller.id).await? {
            if conn.status.is_connected()
                && !conn.namespace.is_empty()
                && !namespaces.contains(&conn.namespace)
            {
                namespaces.push(conn.namespace);
            }
        }

        if namespaces.is_empty() {
            return Ok(TokenOutcome {
                token: None,
                expires_at: None,
                message: Some("No active Smithery connections".into()),
            });
        }

        let request = TokenRequest {
            namespaces,
            caller_id: caller.id.clone(),
            ttl_secs: self.token_ttl_secs,
        };
        let token = self
            .provider
            .create_token(&request)
            .await
            .map_err(|e| LifecycleError::provider(TOKEN_FAILED, e))?;

        Ok(TokenOutcome {
            token: Some(token.token),
            expires_at: token.expires_at,
            message: None,
        })
    }
}
