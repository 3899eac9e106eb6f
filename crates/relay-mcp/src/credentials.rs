//! Credential resolution: which URL to hit and which headers to attach.
//!
//! Resolution is a pure function of the descriptor, the optional session id
//! and a [`SecretStore`]. It never fails; a missing secret simply means the
//! corresponding header is left off.

use relay_types::{GenericServer, ManagedServer, ServerKind};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use std::collections::HashMap;

/// Header carrying the protocol session id on outgoing requests.
pub const SESSION_HEADER: &str = "mcp-session-id";

/// Secret consulted for managed connections.
pub const PROVIDER_KEY_SECRET: &str = "SMITHERY_API_KEY";

/// Named deployment secrets.
///
/// Explicit values take precedence; the process environment is consulted
/// only when the store was built with [`SecretStore::from_env`]. Empty
/// values are treated as absent.
#[derive(Debug, Clone, Default)]
pub struct SecretStore {
    values: HashMap<String, String>,
    env_fallback: bool,
}

impl SecretStore {
    pub fn from_env() -> Self {
        Self {
            values: HashMap::new(),
            env_fallback: true,
        }
    }

    /// A store backed only by `values`.
    pub fn from_map(values: HashMap<String, String>) -> Self {
        Self {
            values,
            env_fallback: false,
        }
    }

    /// Layer explicit values over whatever the store already resolves.
    pub fn with_overrides(mut self, overrides: HashMap<String, String>) -> Self {
        self.values.extend(overrides);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.values
            .get(name)
            .cloned()
            .or_else(|| {
                if self.env_fallback {
                    std::env::var(name).ok()
                } else {
                    None
                }
            })
            .filter(|v| !v.is_empty())
    }
}

/// Where a matched host gets its key from.
#[derive(Debug, Clone, Copy)]
enum KeySource {
    /// Per-call key first, then each named secret in order. Sent as Bearer.
    CallerThenSecrets(&'static [&'static str]),
    /// Internal platform functions: Bearer and `apikey` from one secret.
    InternalPlatform(&'static str),
}

#[derive(Debug, Clone, Copy)]
struct ProviderRule {
    name: &'static str,
    host_fragment: &'static str,
    source: KeySource,
}

/// Known hosts, checked in order by substring match on the URL.
const PROVIDER_RULES: &[ProviderRule] = &[
    ProviderRule {
        name: "tavily",
        host_fragment: "mcp.tavily.com",
        source: KeySource::CallerThenSecrets(&["TAVILY_API_KEY"]),
    },
    ProviderRule {
        name: "customgpt",
        host_fragment: "mcp.customgpt.ai",
        source: KeySource::CallerThenSecrets(&["CUSTOMGPT_PROJECT_TOKEN", "CustomGPT_API_KEY"]),
    },
    ProviderRule {
        name: "exa",
        host_fragment: "mcp.exa.ai",
        source: KeySource::CallerThenSecrets(&["EXA_API_KEY"]),
    },
    ProviderRule {
        name: "composio",
        host_fragment: "mcp.composio.dev",
        source: KeySource::CallerThenSecrets(&["COMPOSIO_API_KEY"]),
    },
    ProviderRule {
        name: "smithery",
        host_fragment: "server.smithery.ai",
        source: KeySource::CallerThenSecrets(&[PROVIDER_KEY_SECRET]),
    },
    ProviderRule {
        name: "internal",
        host_fragment: "supabase.co/functions/v1/",
        source: KeySource::InternalPlatform("SUPABASE_ANON_KEY"),
    },
];

/// The outcome of resolution: endpoint plus headers to attach.
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    pub url: String,
    pub headers: HeaderMap,
}

impl ResolvedTarget {
    fn new(url: String) -> Self {
        Self {
            url,
            headers: HeaderMap::new(),
        }
    }

    fn set(&mut self, name: HeaderName, value: &str) {
        match HeaderValue::from_str(value) {
            Ok(mut v) => {
                if name == AUTHORIZATION || name.as_str() == "apikey" {
                    v.set_sensitive(true);
                }
                self.headers.insert(name, v);
            }
            Err(_) => tracing::warn!("Dropping header '{name}': value is not a valid header"),
        }
    }

    fn bearer(&mut self, token: &str) {
        self.set(AUTHORIZATION, &format!("Bearer {token}"));
    }

    /// Header value as a string, mostly for assertions and logging.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Decides endpoint and authentication for each outgoing call.
#[derive(Debug, Clone)]
pub struct CredentialResolver {
    secrets: SecretStore,
    provider_base_url: String,
}

impl CredentialResolver {
    pub fn new(secrets: SecretStore, provider_base_url: impl Into<String>) -> Self {
        Self {
            secrets,
            provider_base_url: provider_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn resolve(&self, kind: &ServerKind, session_id: Option<&str>) -> ResolvedTarget {
        match kind {
            ServerKind::Managed(server) => self.resolve_managed(server),
            ServerKind::Generic(server) => self.resolve_generic(server, session_id),
        }
    }

    // Managed connections never carry a session header.
    fn resolve_managed(&self, server: &ManagedServer) -> ResolvedTarget {
        let mut target = ResolvedTarget::new(format!(
            "{}/connect/{}/{}/mcp",
            self.provider_base_url, server.namespace, server.connection_id
        ));
        if let Some(key) = self.secrets.get(PROVIDER_KEY_SECRET) {
            target.bearer(&key);
        }
        target
    }

    fn resolve_generic(&self, server: &GenericServer, session_id: Option<&str>) -> ResolvedTarget {
        let mut target = ResolvedTarget::new(server.url.clone());
        let rule = PROVIDER_RULES
            .iter()
            .find(|rule| server.url.contains(rule.host_fragment));

        match rule.map(|r| (r.name, r.source)) {
            Some((name, KeySource::CallerThenSecrets(secrets))) => {
                let key = server
                    .api_key
                    .clone()
                    .or_else(|| secrets.iter().find_map(|s| self.secrets.get(s)));
                match key {
                    Some(key) => target.bearer(&key),
                    None => tracing::debug!(provider = name, "No credential available"),
                }
            }
            Some((_, KeySource::InternalPlatform(secret))) => {
                if let Some(key) = self.secrets.get(secret) {
                    target.bearer(&key);
                    target.set(HeaderName::from_static("apikey"), &key);
                }
            }
            None => {
                if let Some(key) = &server.api_key {
                    target.bearer(key);
                }
            }
        }

        if let Some(id) = session_id {
            target.set(HeaderName::from_static(SESSION_HEADER), id);
        }
        target
    }
}
