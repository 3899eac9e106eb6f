//! Multi-tier TOML configuration for mcp-relay.
//!
//! Reads configuration from multiple sources with precedence:
//! CLI flags > env vars > config file > defaults

use relay_types::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The default listen address for the HTTP surfaces.
pub const DEFAULT_LISTEN: &str = "127.0.0.1:8787";

/// The default managed-connection provider API.
pub const DEFAULT_PROVIDER_BASE_URL: &str = "https://api.smithery.ai";

/// Namespace created when the provider account has none.
pub const DEFAULT_NAMESPACE: &str = "n4-app";

/// MCP protocol revision sent in `initialize`.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

pub const DEFAULT_CLIENT_NAME: &str = "mcp-relay";

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

pub const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

/// Resolved configuration for a relay process.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub listen: String,
    pub provider: ProviderConfig,
    pub mcp: McpClientConfig,
    pub store: StoreConfig,
    pub auth: AuthConfig,
    /// Provider secrets overlaid on the process environment.
    pub secrets: HashMap<String, String>,
    pub config_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub namespace: String,
    pub token_ttl_secs: u64,
}

#[derive(Debug, Clone)]
pub struct McpClientConfig {
    pub protocol_version: String,
    pub client_name: String,
    pub client_version: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    File,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Verify bearer tokens against the identity service.
    Remote,
    /// Verify bearer tokens against the `[auth.tokens]` table.
    Static,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub mode: AuthMode,
    pub url: Option<String>,
    pub service_key: Option<String>,
    pub tokens: HashMap<String, String>,
}

/// Settings that can be read from a TOML config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub provider: ProviderSettings,
    #[serde(default)]
    pub mcp: McpSettings,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub secrets: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerSettings {
    pub listen: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub namespace: Option<String>,
    pub token_ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpSettings {
    pub protocol_version: Option<String>,
    pub client_name: Option<String>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSettings {
    pub backend: Option<String>,
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthSettings {
    pub mode: Option<String>,
    pub url: Option<String>,
    pub service_key: Option<String>,
    #[serde(default)]
    pub tokens: HashMap<String, String>,
}

/// CLI overrides that take highest precedence.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub listen: Option<String>,
    pub config_dir: Option<PathBuf>,
}

impl RelayConfig {
    /// Load configuration from all sources, applying precedence rules.
    ///
    /// Precedence (highest to lowest):
    /// 1. CLI flags
    /// 2. Environment variables
    /// 3. Config file (`<config_dir>/config.toml`)
    /// 4. Defaults
    pub fn load(overrides: CliOverrides) -> Result<Self, ConfigError> {
        let config_dir = overrides.config_dir.clone().unwrap_or_else(config_dir);
        let settings = load_settings_file(&config_dir.join("config.toml"));
        resolve(overrides, settings, config_dir, &|key| std::env::var(key).ok())
    }
}

/// Merge the sources. `env` stands in for the process environment.
fn resolve(
    overrides: CliOverrides,
    settings: SettingsFile,
    config_dir: PathBuf,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<RelayConfig, ConfigError> {
    let listen = overrides
        .listen
        .or_else(|| env("MCP_RELAY_LISTEN"))
        .or(settings.server.listen)
        .unwrap_or_else(|| DEFAULT_LISTEN.to_string());

    let provider = ProviderConfig {
        api_key: env("SMITHERY_API_KEY")
            .or(settings.provider.api_key)
            .filter(|k| !k.is_empty()),
        base_url: env("SMITHERY_API_BASE_URL")
            .or(settings.provider.base_url)
            .unwrap_or_else(|| DEFAULT_PROVIDER_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string(),
        namespace: env("MCP_RELAY_NAMESPACE")
            .or(settings.provider.namespace)
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
        token_ttl_secs: settings
            .provider
            .token_ttl_secs
            .unwrap_or(DEFAULT_TOKEN_TTL_SECS),
    };

    let mcp = McpClientConfig {
        protocol_version: settings
            .mcp
            .protocol_version
            .unwrap_or_else(|| DEFAULT_PROTOCOL_VERSION.to_string()),
        client_name: settings
            .mcp
            .client_name
            .unwrap_or_else(|| DEFAULT_CLIENT_NAME.to_string()),
        client_version: env!("CARGO_PKG_VERSION").to_string(),
        timeout_ms: settings.mcp.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS),
    };

    let backend = match env("MCP_RELAY_STORE")
        .or(settings.store.backend)
        .as_deref()
        .unwrap_or("file")
    {
        "file" => StoreBackend::File,
        "memory" => StoreBackend::Memory,
        other => {
            return Err(ConfigError::InvalidValue {
                key: "store.backend".into(),
                message: format!("expected \"file\" or \"memory\", got \"{other}\""),
            });
        }
    };
    let store = StoreConfig {
        backend,
        data_dir: settings
            .store
            .data_dir
            .unwrap_or_else(|| config_dir.join("data")),
    };

    let mode = match settings.auth.mode.as_deref().unwrap_or("remote") {
        "remote" => AuthMode::Remote,
        "static" => AuthMode::Static,
        other => {
            return Err(ConfigError::InvalidValue {
                key: "auth.mode".into(),
                message: format!("expected \"remote\" or \"static\", got \"{other}\""),
            });
        }
    };
    let auth = AuthConfig {
        mode,
        url: env("SUPABASE_URL").or(settings.auth.url),
        service_key: env("SUPABASE_SERVICE_ROLE_KEY").or(settings.auth.service_key),
        tokens: settings.auth.tokens,
    };

    Ok(RelayConfig {
        listen,
        provider,
        mcp,
        store,
        auth,
        secrets: settings.secrets,
        config_dir,
    })
}

/// Get the relay config directory path (~/.mcp-relay/).
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("MCP_RELAY_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mcp-relay")
}

/// Load and parse a TOML settings file, returning defaults on any error.
fn load_settings_file(path: &Path) -> SettingsFile {
    match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("Failed to parse {}: {}", path.display(), e);
            SettingsFile::default()
        }),
        Err(_) => SettingsFile::default(),
    }
}
