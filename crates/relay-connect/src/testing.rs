//! In-memory provider for tests.

use crate::error::ProviderError;
use crate::provider::{
    ConnectionProvider, NewConnection, ProviderConnection, ScopedToken, TokenRequest,
};
use relay_types::{BoxFuture, ConnectionStatus};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone)]
struct RemoteConnection {
    namespace: String,
    caller_id: String,
    connection: ProviderConnection,
}

#[derive(Debug, Default)]
struct State {
    namespaces: Vec<String>,
    created_namespaces: Vec<String>,
    namespace_conflict: bool,
    created_status: Option<(ConnectionStatus, Option<String>)>,
    settled_status: Option<(ConnectionStatus, Option<String>)>,
    connections: Vec<RemoteConnection>,
    failing: HashSet<String>,
    calls: Vec<String>,
    token_requests: Vec<TokenRequest>,
}

/// A provider that keeps connections in memory and records every call.
///
/// Operations named with [`ScriptedProvider::failing`] return HTTP 500:
/// `list_namespaces`, `create_namespace`, `put`, `get`, `list`, `delete`,
/// `token`.
pub struct ScriptedProvider {
    configured: bool,
    state: Mutex<State>,
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            configured: true,
            state: Mutex::new(State::default()),
        }
    }

    /// A provider with no API key; every call fails with `MissingApiKey`.
    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::new()
        }
    }

    pub fn with_namespaces(self, names: &[&str]) -> Self {
        self.lock().namespaces = names.iter().map(|n| n.to_string()).collect();
        self
    }

    /// Namespace creation answers "already exists".
    pub fn with_namespace_conflict(self) -> Self {
        self.lock().namespace_conflict = true;
        self
    }

    /// Status returned in the create response.
    pub fn with_created_status(self, status: ConnectionStatus, authorization_url: Option<&str>) -> Self {
        self.lock().created_status = Some((status, authorization_url.map(String::from)));
        self
    }

    /// Status the provider actually holds after create, seen by later reads.
    pub fn with_settled_status(self, status: ConnectionStatus, authorization_url: Option<&str>) -> Self {
        self.lock().settled_status = Some((status, authorization_url.map(String::from)));
        self
    }

    pub fn failing(self, op: &str) -> Self {
        self.lock().failing.insert(op.to_string());
        self
    }

    /// Change the remote status of an existing connection.
    pub fn set_status(&self, connection_id: &str, status: ConnectionStatus, authorization_url: Option<&str>) {
        let mut state = self.lock();
        if let Some(remote) = state
            .connections
            .iter_mut()
            .find(|r| r.connection.connection_id == connection_id)
        {
            remote.connection.status = status;
            remote.connection.authorization_url = authorization_url.map(String::from);
        }
    }

    /// Register a connection directly, bypassing `put_connection`.
    pub fn insert_remote(&self, namespace: &str, caller_id: &str, connection: ProviderConnection) {
        self.lock().connections.push(RemoteConnection {
            namespace: namespace.to_string(),
            caller_id: caller_id.to_string(),
            connection,
        });
    }

    /// Calls in `METHOD /path` form.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn created_namespaces(&self) -> Vec<String> {
        self.lock().created_namespaces.clone()
    }

    pub fn token_requests(&self) -> Vec<TokenRequest> {
        self.lock().token_requests.clone()
    }

    pub fn remote_ids(&self) -> Vec<String> {
        self.lock()
            .connections
            .iter()
            .map(|r| r.connection.connection_id.clone())
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record a call and decide whether it should fail.
    fn enter(&self, op: &str, call: String) -> Result<MutexGuard<'_, State>, ProviderError> {
        if !self.configured {
            return Err(ProviderError::MissingApiKey);
        }
        let mut state = self.lock();
        state.calls.push(call);
        if state.failing.contains(op) {
            return Err(ProviderError::Status {
                status: 500,
                body: format!("scripted {op} failure"),
            });
        }
        Ok(state)
    }

    fn find(state: &State, namespace: &str, connection_id: &str) -> Option<ProviderConnection> {
        state
            .connections
            .iter()
            .find(|r| r.namespace == namespace && r.connection.connection_id == connection_id)
            .map(|r| r.connection.clone())
    }

    fn not_found(connection_id: &str) -> ProviderError {
        ProviderError::Status {
            status: 404,
            body: format!("connection {connection_id} not found"),
        }
    }
}

impl ConnectionProvider for ScriptedProvider {
    fn is_configured(&self) -> bool {
        self.configured
    }

    fn list_namespaces(&self) -> BoxFuture<'_, Result<Vec<String>, ProviderError>> {
        Box::pin(async move {
            let state = self.enter("list_namespaces", "GET /namespaces".into())?;
            Ok(state.namespaces.clone())
        })
    }

    fn create_namespace<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<bool, ProviderError>> {
        Box::pin(async move {
            let mut state = self.enter("create_namespace", format!("PUT /namespaces/{name}"))?;
            if state.namespace_conflict || state.namespaces.iter().any(|n| n == name) {
                return Ok(false);
            }
            state.namespaces.push(name.to_string());
            state.created_namespaces.push(name.to_string());
            Ok(true)
        })
    }

    fn put_connection<'a>(
        &'a self,
        namespace: &'a str,
        connection_id: &'a str,
        connection: &'a NewConnection,
    ) -> BoxFuture<'a, Result<ProviderConnection, ProviderError>> {
        Box::pin(async move {
            let mut state =
                self.enter("put", format!("PUT /connect/{namespace}/{connection_id}"))?;
            let (status, authorization_url) = state
                .created_status
                .clone()
                .unwrap_or((ConnectionStatus::Connected, None));
            let created = ProviderConnection {
                connection_id: connection_id.to_string(),
                status,
                authorization_url,
                server_info: None,
            };
            let mut stored = created.clone();
            if let Some((status, url)) = state.settled_status.clone() {
                stored.status = status;
                stored.authorization_url = url;
            }
            state.connections.push(RemoteConnection {
                namespace: namespace.to_string(),
                caller_id: connection.caller_id.clone(),
                connection: stored,
            });
            Ok(created)
        })
    }

    fn get_connection<'a>(
        &'a self,
        namespace: &'a str,
        connection_id: &'a str,
    ) -> BoxFuture<'a, Result<ProviderConnection, ProviderError>> {
        Box::pin(async move {
            let state = self.enter("get", format!("GET /connect/{namespace}/{connection_id}"))?;
            Self::find(&state, namespace, connection_id).ok_or_else(|| Self::not_found(connection_id))
        })
    }

    fn list_connections<'a>(
        &'a self,
        namespace: &'a str,
        caller_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ProviderConnection>, ProviderError>> {
        Box::pin(async move {
            let state = self.enter("list", format!("GET /connect/{namespace}"))?;
            Ok(state
                .connections
                .iter()
                .filter(|r| r.namespace == namespace && r.caller_id == caller_id)
                .map(|r| r.connection.clone())
                .collect())
        })
    }

    fn delete_connection<'a>(
        &'a self,
        namespace: &'a str,
        connection_id: &'a str,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(async move {
            let mut state =
                self.enter("delete", format!("DELETE /connect/{namespace}/{connection_id}"))?;
            let before = state.connections.len();
            state.connections.retain(|r| {
                !(r.namespace == namespace && r.connection.connection_id == connection_id)
            });
            if state.connections.len() == before {
                return Err(Self::not_found(connection_id));
            }
            Ok(())
        })
    }

    fn create_token<'a>(
        &'a self,
        request: &'a TokenRequest,
    ) -> BoxFuture<'a, Result<ScopedToken, ProviderError>> {
        Box::pin(async move {
            let mut state = self.enter("token", "POST /tokens".into())?;
            state.token_requests.push(request.clone());
            Ok(ScopedToken {
                token: format!("scoped-{}", request.caller_id),
                expires_at: Some("2030-01-01T00:00:00Z".into()),
            })
        })
    }
}
