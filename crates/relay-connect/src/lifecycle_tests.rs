//! Connection lifecycle against a scripted provider and transport.

use std::sync::Arc;

use crate::testing::ScriptedProvider;
use crate::{ConnectionManager, CreateConnection, LifecycleError, NamespaceResolver};
use relay_mcp::testing::ScriptedTransport;
use relay_mcp::{McpError, RpcResponse};
use relay_store::{MemoryCache, MemoryStore};
use relay_types::{CallerIdentity, ConnectionStatus, ConnectionStore, ManagedConnection};
use serde_json::json;

struct Harness {
    manager: ConnectionManager,
    provider: Arc<ScriptedProvider>,
    store: Arc<MemoryStore>,
    transport: Arc<ScriptedTransport>,
}

fn harness(provider: ScriptedProvider, transport: ScriptedTransport) -> Harness {
    let provider = Arc::new(provider);
    let store = Arc::new(MemoryStore::new());
    let transport = Arc::new(transport);
    let namespaces = NamespaceResolver::new(provider.clone(), Arc::new(MemoryCache::new()), "n4-app");
    let manager = ConnectionManager::new(
        provider.clone(),
        store.clone(),
        transport.clone(),
        namespaces,
        3600,
    );
    Harness {
        manager,
        provider,
        store,
        transport,
    }
}

fn tools_ok() -> ScriptedTransport {
    ScriptedTransport::new(|_| {
        Ok(RpcResponse::new(json!({
            "tools": [
                {"name": "search", "description": "Search the web"},
                {"name": "fetch", "inputSchema": {"type": "object", "properties": {"url": {"type": "string"}}}}
            ]
        })))
    })
}

fn tools_failing() -> ScriptedTransport {
    ScriptedTransport::new(|_| {
        Err(McpError::Http {
            status: 401,
            body: "authorization required".into(),
        })
    })
}

fn caller() -> CallerIdentity {
    CallerIdentity::new("user-1")
}

fn request(url: &str, name: &str) -> CreateConnection {
    CreateConnection {
        mcp_url: url.into(),
        display_name: name.into(),
    }
}

#[tokio::test]
async fn create_connected_and_round_trip_through_list() {
    let h = harness(ScriptedProvider::new(), tools_ok());
    let out = h
        .manager
        .create(&caller(), request("https://server.smithery.ai/exa", "Exa"))
        .await
        .unwrap();

    assert_eq!(out.status, ConnectionStatus::Connected);
    assert!(out.connection_id.starts_with("user-1-"));
    assert!(out.authorization_url.is_none());

    let listed = h.manager.list(&caller()).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].connection_id, out.connection_id);
    assert_eq!(listed[0].namespace, "n4-app");
    assert_eq!(listed[0].mcp_url, "https://server.smithery.ai/exa");

    // The verification call went through the managed relay.
    let calls = h.transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, "tools/list");
    assert!(calls[0].server.is_managed());
}

#[tokio::test]
async fn optimistic_connected_is_downgraded_to_auth_required() {
    let provider = ScriptedProvider::new()
        .with_created_status(ConnectionStatus::Connected, None)
        .with_settled_status(ConnectionStatus::AuthRequired, Some("https://auth.example/start"));
    let h = harness(provider, tools_failing());

    let out = h
        .manager
        .create(&caller(), request("https://server.smithery.ai/gmail", "Gmail"))
        .await
        .unwrap();
    assert_eq!(out.status, ConnectionStatus::AuthRequired);
    assert_eq!(out.authorization_url.as_deref(), Some("https://auth.example/start"));

    let rows = h.store.connections();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, ConnectionStatus::AuthRequired);
    assert_eq!(rows[0].authorization_url.as_deref(), Some("https://auth.example/start"));
}

#[tokio::test]
async fn failed_verification_without_auth_requirement_keeps_connected() {
    let h = harness(ScriptedProvider::new(), tools_failing());
    let out = h
        .manager
        .create(&caller(), request("https://server.smithery.ai/exa", "Exa"))
        .await
        .unwrap();
    assert_eq!(out.status, ConnectionStatus::Connected);
}

#[tokio::test]
async fn auth_required_on_create_skips_verification() {
    let provider = ScriptedProvider::new()
        .with_created_status(ConnectionStatus::AuthRequired, Some("https://auth.example/x"));
    let h = harness(provider, tools_ok());
    let out = h
        .manager
        .create(&caller(), request("https://server.smithery.ai/gmail", "Gmail"))
        .await
        .unwrap();
    assert_eq!(out.status, ConnectionStatus::AuthRequired);
    assert_eq!(out.authorization_url.as_deref(), Some("https://auth.example/x"));
    assert!(h.transport.calls().is_empty());
}

#[tokio::test]
async fn create_validates_input_before_touching_provider() {
    let h = harness(ScriptedProvider::new(), tools_ok());
    let err = h
        .manager
        .create(&caller(), request("", "Exa"))
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::InvalidInput(_)));
    assert_eq!(err.to_string(), "mcpUrl and displayName are required");
    assert!(h.provider.calls().is_empty());
}

#[tokio::test]
async fn create_provider_failure_is_reported() {
    let h = harness(ScriptedProvider::new().failing("put"), tools_ok());
    let err = h
        .manager
        .create(&caller(), request("https://x/mcp", "X"))
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Provider(_)));
    assert!(err.to_string().starts_with("Smithery connection failed: "));
    assert!(h.store.connections().is_empty());
}

#[tokio::test]
async fn create_without_api_key_is_config_error() {
    let h = harness(ScriptedProvider::unconfigured(), tools_ok());
    let err = h
        .manager
        .create(&caller(), request("https://x/mcp", "X"))
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Config(_)));
}

#[tokio::test]
async fn list_syncs_status_from_provider() {
    let h = harness(ScriptedProvider::new(), tools_ok());
    let out = h
        .manager
        .create(&caller(), request("https://server.smithery.ai/exa", "Exa"))
        .await
        .unwrap();

    h.provider
        .set_status(&out.connection_id, ConnectionStatus::parse("error"), None);
    let listed = h.manager.list(&caller()).await.unwrap();
    assert_eq!(listed[0].status, ConnectionStatus::Other("error".into()));
}

#[tokio::test]
async fn list_returns_rows_when_sync_fails() {
    let h = harness(ScriptedProvider::new().failing("list"), tools_ok());
    h.store.upsert(row("user-1", "user-1-1")).await.unwrap();
    h.store.upsert(row("user-2", "user-2-1")).await.unwrap();

    let listed = h.manager.list(&caller()).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].connection_id, "user-1-1");
}

#[tokio::test]
async fn retry_and_verify_refresh_status() {
    let provider = ScriptedProvider::new()
        .with_created_status(ConnectionStatus::AuthRequired, Some("https://auth"));
    let h = harness(provider, tools_ok());
    let out = h
        .manager
        .create(&caller(), request("https://server.smithery.ai/gmail", "Gmail"))
        .await
        .unwrap();

    h.provider
        .set_status(&out.connection_id, ConnectionStatus::Connected, None);
    let retried = h.manager.retry(&caller(), &out.connection_id).await.unwrap();
    assert_eq!(retried.status, ConnectionStatus::Connected);
    assert!(retried.authorization_url.is_none());
    assert_eq!(h.store.connections()[0].status, ConnectionStatus::Connected);

    let verified = h.manager.verify(&caller(), &out.connection_id).await.unwrap();
    assert_eq!(verified, retried);
}

#[tokio::test]
async fn retry_requires_connection_id_and_reports_provider_failure() {
    let h = harness(ScriptedProvider::new(), tools_ok());
    let err = h.manager.retry(&caller(), "").await.unwrap_err();
    assert_eq!(err.to_string(), "connectionId is required");

    let err = h.manager.verify(&caller(), "user-1-404").await.unwrap_err();
    assert!(err.to_string().starts_with("Retry failed: "));
}

#[tokio::test]
async fn remove_deletes_locally_even_when_provider_fails() {
    let h = harness(ScriptedProvider::new().failing("delete"), tools_ok());
    h.store.upsert(row("user-1", "user-1-1")).await.unwrap();

    h.manager.remove(&caller(), "user-1-1").await.unwrap();
    assert!(h.store.connections().is_empty());
    assert!(
        h.provider
            .calls()
            .contains(&"DELETE /connect/n4-app/user-1-1".to_string())
    );
}

#[tokio::test]
async fn remove_is_scoped_to_caller() {
    let h = harness(ScriptedProvider::new(), tools_ok());
    h.store.upsert(row("user-2", "user-2-1")).await.unwrap();
    h.manager.remove(&caller(), "user-2-1").await.unwrap();
    assert_eq!(h.store.connections().len(), 1);
}

#[tokio::test]
async fn remove_deletes_remote_connection() {
    let h = harness(ScriptedProvider::new(), tools_ok());
    let out = h
        .manager
        .create(&caller(), request("https://server.smithery.ai/exa", "Exa"))
        .await
        .unwrap();
    h.manager.remove(&caller(), &out.connection_id).await.unwrap();
    assert!(h.provider.remote_ids().is_empty());
    assert!(h.manager.list(&caller()).await.unwrap().is_empty());
}

#[tokio::test]
async fn list_tools_aggregates_connected_servers() {
    let h = harness(ScriptedProvider::new().with_namespaces(&["n4-app"]), tools_ok());
    h.store.upsert(row("user-1", "user-1-1")).await.unwrap();
    let mut pending = row("user-1", "user-1-2");
    pending.status = ConnectionStatus::AuthRequired;
    h.store.upsert(pending).await.unwrap();

    let catalog = h.manager.list_tools(&caller()).await.unwrap();
    assert_eq!(catalog.servers.len(), 1);
    assert_eq!(catalog.servers[0].tool_count, 2);
    assert_eq!(catalog.tools.len(), 2);

    let search = &catalog.tools[0];
    assert_eq!(search.description, "Search the web");
    assert_eq!(search.server_name, "Exa");
    assert_eq!(search.connection_id, "user-1-1");

    let fetch = &catalog.tools[1];
    assert_eq!(fetch.description, "fetch");
    assert_eq!(fetch.input_schema["properties"]["url"]["type"], "string");
}

#[tokio::test]
async fn list_tools_skips_failing_servers() {
    let transport = ScriptedTransport::new(|call| {
        if call.server.connection_id() == Some("user-1-bad") {
            Err(McpError::Network("unreachable".into()))
        } else {
            Ok(RpcResponse::new(json!({"tools": [{"name": "only"}]})))
        }
    });
    let h = harness(ScriptedProvider::new().with_namespaces(&["n4-app"]), transport);
    h.store.upsert(row("user-1", "user-1-bad")).await.unwrap();
    h.store.upsert(row("user-1", "user-1-good")).await.unwrap();

    let catalog = h.manager.list_tools(&caller()).await.unwrap();
    assert_eq!(catalog.servers.len(), 1);
    assert_eq!(catalog.servers[0].connection_id, "user-1-good");
    assert_eq!(catalog.tools[0].input_schema, json!({"type": "object", "properties": {}}));
}

#[tokio::test]
async fn list_tools_requires_api_key() {
    let h = harness(ScriptedProvider::unconfigured(), tools_ok());
    let err = h.manager.list_tools(&caller()).await.unwrap_err();
    assert!(matches!(err, LifecycleError::Config(_)));
}

#[tokio::test]
async fn mint_token_without_connections() {
    let h = harness(ScriptedProvider::new(), tools_ok());
    let out = h.manager.mint_token(&caller()).await.unwrap();
    assert!(out.token.is_none());
    assert_eq!(out.message.as_deref(), Some("No active Smithery connections"));
    assert!(h.provider.token_requests().is_empty());
}

#[tokio::test]
async fn mint_token_scopes_distinct_connected_namespaces() {
    let h = harness(ScriptedProvider::new(), tools_ok());
    h.store.upsert(row("user-1", "a")).await.unwrap();
    h.store.upsert(row("user-1", "b")).await.unwrap();
    let mut other = row("user-1", "c");
    other.namespace = "team-b".into();
    other.status = ConnectionStatus::AuthRequired;
    h.store.upsert(other).await.unwrap();

    let out = h.manager.mint_token(&caller()).await.unwrap();
    assert_eq!(out.token.as_deref(), Some("scoped-user-1"));
    assert!(out.expires_at.is_some());

    let requests = h.provider.token_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].namespaces, vec!["n4-app".to_string()]);
    assert_eq!(requests[0].ttl_secs, 3600);
}

#[tokio::test]
async fn mint_token_failure_is_provider_error() {
    let h = harness(ScriptedProvider::new().failing("token"), tools_ok());
    h.store.upsert(row("user-1", "a")).await.unwrap();
    let err = h.manager.mint_token(&caller()).await.unwrap_err();
    assert!(err.to_string().starts_with("Smithery token creation failed: "));
}

fn row(caller_id: &str, connection_id: &str) -> ManagedConnection {
    let now = chrono::Utc::now();
    ManagedConnection {
        caller_id: caller_id.into(),
        connection_id: connection_id.into(),
        namespace: "n4-app".into(),
        mcp_url: "https://server.smithery.ai/exa".into(),
        display_name: "Exa".into(),
        status: ConnectionStatus::Connected,
        authorization_url: None,
        created_at: now,
        updated_at: now,
    }
}
