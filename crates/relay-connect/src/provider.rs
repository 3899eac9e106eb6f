//! The provider's connection-management REST API.

use crate::error::ProviderError;
use relay_types::{BoxFuture, ConnectionStatus};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// A connection as the provider reports it.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConnection {
    pub connection_id: String,
    pub status: ConnectionStatus,
    pub authorization_url: Option<String>,
    pub server_info: Option<Value>,
}

impl ProviderConnection {
    /// Read a provider connection object leniently.
    ///
    /// `fallback_id` is used when the body omits `connectionId` (single-item
    /// endpoints address the connection by path). A missing status reads as
    /// `connected`; status may be a string or `{state, authorizationUrl}`.
    pub fn from_value(value: &Value, fallback_id: Option<&str>) -> Option<Self> {
        let connection_id = value
            .get("connectionId")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .or(fallback_id)?
            .to_string();

        let (status, nested_url) = match value.get("status") {
            None | Some(Value::Null) => (ConnectionStatus::Connected, None),
            Some(Value::String(s)) => (ConnectionStatus::parse(s), None),
            Some(obj @ Value::Object(_)) => (
                obj.get("state")
                    .and_then(Value::as_str)
                    .map(ConnectionStatus::parse)
                    .unwrap_or(ConnectionStatus::Connected),
                str_field(obj, "authorizationUrl"),
            ),
            Some(other) => (ConnectionStatus::Other(other.to_string()), None),
        };

        Some(Self {
            connection_id,
            status,
            authorization_url: str_field(value, "authorizationUrl").or(nested_url),
            server_info: value.get("serverInfo").filter(|v| !v.is_null()).cloned(),
        })
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Registration payload for a new connection.
#[derive(Debug, Clone)]
pub struct NewConnection {
    pub mcp_url: String,
    pub display_name: String,
    pub caller_id: String,
}

/// Scope of a minted token.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenRequest {
    pub namespaces: Vec<String>,
    pub caller_id: String,
    pub ttl_secs: u64,
}

impl TokenRequest {
    /// Request body for `POST /tokens`.
    pub fn to_body(&self) -> Value {
        let scope = |action: &str| {
            json!({
                "actions": [action],
                "namespaces": self.namespaces,
                "metadata": { "userId": self.caller_id },
            })
        };
        json!({
            "allow": {
                "connections": scope("read"),
                "mcp": scope("write"),
            },
            "ttlSeconds": self.ttl_secs,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopedToken {
    pub token: String,
    #[serde(default)]
    pub expires_at: Option<String>,
}

/// The provider's managed-connection backend.
pub trait ConnectionProvider: Send + Sync {
    /// Whether an API key is available. Calls fail with
    /// [`ProviderError::MissingApiKey`] when it is not.
    fn is_configured(&self) -> bool;

    fn list_namespaces(&self) -> BoxFuture<'_, Result<Vec<String>, ProviderError>>;

    /// Create a namespace. `Ok(false)` means it already existed.
    fn create_namespace<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<bool, ProviderError>>;

    fn put_connection<'a>(
        &'a self,
        namespace: &'a str,
        connection_id: &'a str,
        connection: &'a NewConnection,
    ) -> BoxFuture<'a, Result<ProviderConnection, ProviderError>>;

    fn get_connection<'a>(
        &'a self,
        namespace: &'a str,
        connection_id: &'a str,
    ) -> BoxFuture<'a, Result<ProviderConnection, ProviderError>>;

    /// Connections in `namespace` tagged with the caller's id.
    fn list_connections<'a>(
        &'a self,
        namespace: &'a str,
        caller_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ProviderConnection>, ProviderError>>;

    fn delete_connection<'a>(
        &'a self,
        namespace: &'a str,
        connection_id: &'a str,
    ) -> BoxFuture<'a, Result<(), ProviderError>>;

    fn create_token<'a>(
        &'a self,
        request: &'a TokenRequest,
    ) -> BoxFuture<'a, Result<ScopedToken, ProviderError>>;
}

/// REST client for the Smithery connection API.
#[derive(Clone)]
pub struct SmitheryClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl SmitheryClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
        }
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ProviderError> {
        let key = self.api_key.as_deref().ok_or(ProviderError::MissingApiKey)?;
        tracing::debug!("{method} {}{path}", self.base_url);
        Ok(self
            .http
            .request(method, format!("{}{path}", self.base_url))
            .bearer_auth(key))
    }

    /// Send and return the status plus the body parsed as JSON (`null` if empty).
    async fn send(&self, request: RequestBuilder) -> Result<(StatusCode, Value), ProviderError> {
        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }
        if body.trim().is_empty() {
            return Ok((status, Value::Null));
        }
        let value = serde_json::from_str(&body).map_err(|e| ProviderError::Malformed(e.to_string()))?;
        Ok((status, value))
    }

    async fn fetch_namespaces(&self) -> Result<Vec<String>, ProviderError> {
        let (_, body) = self.send(self.request(Method::GET, "/namespaces")?).await?;
        let items = match &body {
            Value::Array(items) => items.as_slice(),
            other => other
                .get("namespaces")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default(),
        };
        Ok(items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                other => str_field(other, "name"),
            })
            .collect())
    }

    async fn put_namespace(&self, name: &str) -> Result<bool, ProviderError> {
        let request = self.request(Method::PUT, &format!("/namespaces/{name}"))?;
        match self.send(request).await {
            Ok(_) => Ok(true),
            Err(ProviderError::Status { status: 409, .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn register(
        &self,
        namespace: &str,
        connection_id: &str,
        connection: &NewConnection,
    ) -> Result<ProviderConnection, ProviderError> {
        let request = self
            .request(Method::PUT, &format!("/connect/{namespace}/{connection_id}"))?
            .json(&json!({
                "mcpUrl": connection.mcp_url,
                "name": connection.display_name,
                "metadata": { "userId": connection.caller_id },
            }));
        let (_, body) = self.send(request).await?;
        ProviderConnection::from_value(&body, Some(connection_id))
            .ok_or_else(|| ProviderError::Malformed("connection response is not an object".into()))
    }

    async fn fetch_connection(
        &self,
        namespace: &str,
        connection_id: &str,
    ) -> Result<ProviderConnection, ProviderError> {
        let request = self.request(Method::GET, &format!("/connect/{namespace}/{connection_id}"))?;
        let (_, body) = self.send(request).await?;
        ProviderConnection::from_value(&body, Some(connection_id))
            .ok_or_else(|| ProviderError::Malformed("connection response is not an object".into()))
    }

    async fn fetch_connections(
        &self,
        namespace: &str,
        caller_id: &str,
    ) -> Result<Vec<ProviderConnection>, ProviderError> {
        let metadata = json!({ "userId": caller_id }).to_string();
        let request = self
            .request(Method::GET, &format!("/connect/{namespace}"))?
            .query(&[("metadata", metadata)]);
        let (_, body) = self.send(request).await?;
        let items = match &body {
            Value::Array(items) => items.as_slice(),
            other => other
                .get("data")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default(),
        };
        Ok(items
            .iter()
            .filter_map(|item| ProviderConnection::from_value(item, None))
            .collect())
    }

    async fn remove_connection(&self, namespace: &str, connection_id: &str) -> Result<(), ProviderError> {
        let request =
            self.request(Method::DELETE, &format!("/connect/{namespace}/{connection_id}"))?;
        self.send(request).await?;
        Ok(())
    }

    async fn mint(&self, token: &TokenRequest) -> Result<ScopedToken, ProviderError> {
        let request = self.request(Method::POST, "/tokens")?.json(&token.to_body());
        let (_, body) = self.send(request).await?;
        serde_json::from_value(body).map_err(|e| ProviderError::Malformed(e.to_string()))
    }
}

impl ConnectionProvider for SmitheryClient {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn list_namespaces(&self) -> BoxFuture<'_, Result<Vec<String>, ProviderError>> {
        Box::pin(self.fetch_namespaces())
    }

    fn create_namespace<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<bool, ProviderError>> {
        Box::pin(self.put_namespace(name))
    }

    fn put_connection<'a>(
        &'a self,
        namespace: &'a str,
        connection_id: &'a str,
        connection: &'a NewConnection,
    ) -> BoxFuture<'a, Result<ProviderConnection, ProviderError>> {
        Box::pin(self.register(namespace, connection_id, connection))
    }

    fn get_connection<'a>(
        &'a self,
        namespace: &'a str,
        connection_id: &'a str,
    ) -> BoxFuture<'a, Result<ProviderConnection, ProviderError>> {
        Box::pin(self.fetch_connection(namespace, connection_id))
    }

    fn list_connections<'a>(
        &'a self,
        namespace: &'a str,
        caller_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ProviderConnection>, ProviderError>> {
        Box::pin(self.fetch_connections(namespace, caller_id))
    }

    fn delete_connection<'a>(
        &'a self,
        namespace: &'a str,
        connection_id: &'a str,
    ) -> BoxFuture<'a, Result<(), ProviderError>> {
        Box::pin(self.remove_connection(namespace, connection_id))
    }

    fn create_token<'a>(
        &'a self,
        request: &'a TokenRequest,
    ) -> BoxFuture<'a, Result<ScopedToken, ProviderError>> {
        Box::pin(self.mint(request))
    }
}
