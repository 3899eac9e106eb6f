//! Target server descriptors and their classification.

use crate::error::DescriptorError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// URL scheme reserved for provider-managed connections
/// (`smithery://<namespace>/<connectionId>`).
pub const MANAGED_SCHEME: &str = "smithery://";

/// The server a tool call is addressed to, as supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerDescriptor {
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, alias = "providerConfig", skip_serializing_if = "Option::is_none")]
    pub config: Option<Map<String, Value>>,
}

/// A server whose traffic goes through the provider's managed relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedServer {
    pub namespace: String,
    pub connection_id: String,
}

/// A plain HTTP MCP endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericServer {
    pub url: String,
    pub api_key: Option<String>,
}

/// Closed set of routing variants for a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerKind {
    Managed(ManagedServer),
    Generic(GenericServer),
}

/// Cache key for a server's protocol session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl ServerDescriptor {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: None,
            config: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Descriptor for a managed connection, as the lifecycle manager builds it.
    pub fn managed(namespace: &str, connection_id: &str) -> Self {
        let mut config = Map::new();
        config.insert("namespace".into(), Value::String(namespace.to_string()));
        config.insert(
            "connectionId".into(),
            Value::String(connection_id.to_string()),
        );
        Self {
            url: format!("{MANAGED_SCHEME}{namespace}/{connection_id}"),
            api_key: None,
            config: Some(config),
        }
    }

    /// A non-empty string field from the provider config.
    fn config_str(&self, key: &str) -> Option<&str> {
        self.config
            .as_ref()?
            .get(key)?
            .as_str()
            .filter(|s| !s.is_empty())
    }

    pub fn connection_id(&self) -> Option<&str> {
        self.config_str("connectionId")
    }

    /// Whether calls to this server bypass the session handshake.
    pub fn is_managed(&self) -> bool {
        self.url.starts_with(MANAGED_SCHEME)
            || (self.config_str("namespace").is_some() && self.connection_id().is_some())
    }

    /// Classify the descriptor into a routing variant.
    pub fn kind(&self) -> Result<ServerKind, DescriptorError> {
        if let (Some(namespace), Some(connection_id)) =
            (self.config_str("namespace"), self.connection_id())
        {
            return Ok(ServerKind::Managed(ManagedServer {
                namespace: namespace.to_string(),
                connection_id: connection_id.to_string(),
            }));
        }

        if let Some(rest) = self.url.strip_prefix(MANAGED_SCHEME) {
            let mut parts = rest.trim_end_matches('/').splitn(2, '/');
            return match (parts.next(), parts.next()) {
                (Some(ns), Some(id)) if !ns.is_empty() && !id.is_empty() && !id.contains('/') => {
                    Ok(ServerKind::Managed(ManagedServer {
                        namespace: ns.to_string(),
                        connection_id: id.to_string(),
                    }))
                }
                _ => Err(DescriptorError::IncompleteManaged {
                    url: self.url.clone(),
                }),
            };
        }

        if self.url.trim().is_empty() {
            return Err(DescriptorError::EmptyUrl);
        }

        Ok(ServerKind::Generic(GenericServer {
            url: self.url.clone(),
            api_key: self.api_key.clone().filter(|k| !k.is_empty()),
        }))
    }

    /// `url` alone, or `url::connectionId` when a managed connection id is present.
    pub fn session_key(&self) -> SessionKey {
        match self.connection_id() {
            Some(id) => SessionKey(format!("{}::{}", self.url, id)),
            None => SessionKey(self.url.clone()),
        }
    }
}
