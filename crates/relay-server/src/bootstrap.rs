//! Composition root: wires configuration into the relay's services.

use crate::error::StartupError;
use relay_config::{AuthMode, RelayConfig, StoreBackend};
use relay_connect::{
    ConnectionManager, ConnectionProvider, NamespaceResolver, RemoteIdentityVerifier,
    SmitheryClient, StaticIdentityVerifier,
};
use relay_mcp::credentials::PROVIDER_KEY_SECRET;
use relay_mcp::{ClientIdentity, CredentialResolver, HttpTransport, RpcTransport, SecretStore, ToolExecutor};
use relay_store::{FileStore, MemoryCache, MemoryStore};
use relay_types::{AuditLog, ConfigError, ConnectionStore, IdentityVerifier, KeyValueCache};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;

/// Everything a handler needs.
#[derive(Clone)]
pub struct AppContext {
    pub executor: ToolExecutor,
    pub connections: ConnectionManager,
    pub verifier: Arc<dyn IdentityVerifier>,
}

impl AppContext {
    pub fn new(
        executor: ToolExecutor,
        connections: ConnectionManager,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> Self {
        Self {
            executor,
            connections,
            verifier,
        }
    }
}

/// Build the services described by `config`.
///
/// One [`MemoryCache`] backs both the session and the namespace caches; it
/// lives as long as the returned context.
pub async fn bootstrap(config: &RelayConfig) -> Result<AppContext, StartupError> {
    let timeout = Duration::from_millis(config.mcp.timeout_ms);

    let mut secrets = SecretStore::from_env().with_overrides(config.secrets.clone());
    if let Some(key) = &config.provider.api_key {
        secrets.insert(PROVIDER_KEY_SECRET, key.clone());
    }
    let resolver = CredentialResolver::new(secrets, config.provider.base_url.clone());
    let transport: Arc<dyn RpcTransport> = Arc::new(HttpTransport::new(resolver, timeout)?);
    let cache: Arc<dyn KeyValueCache> = Arc::new(MemoryCache::new());

    let (store, audit): (Arc<dyn ConnectionStore>, Arc<dyn AuditLog>) = match config.store.backend {
        StoreBackend::Memory => {
            let store = Arc::new(MemoryStore::new());
            let audit: Arc<dyn AuditLog> = store.clone();
            (store as Arc<dyn ConnectionStore>, audit)
        }
        StoreBackend::File => {
            let store = Arc::new(FileStore::new(config.store.data_dir.clone()).await?);
            info!("Persisting to {}", store.data_dir().display());
            let audit: Arc<dyn AuditLog> = store.clone();
            (store as Arc<dyn ConnectionStore>, audit)
        }
    };

    let http = reqwest::Client::builder().timeout(timeout).build()?;
    let verifier = build_verifier(config, http.clone())?;

    let provider: Arc<dyn ConnectionProvider> = Arc::new(SmitheryClient::new(
        http,
        config.provider.base_url.clone(),
        config.provider.api_key.clone(),
    ));
    if !provider.is_configured() {
        tracing::warn!("SMITHERY_API_KEY is not set; managed connections are unavailable");
    }
    let namespaces = NamespaceResolver::new(
        provider.clone(),
        cache.clone(),
        config.provider.namespace.clone(),
    );
    let connections = ConnectionManager::new(
        provider,
        store,
        transport.clone(),
        namespaces,
        config.provider.token_ttl_secs,
    );

    let client = ClientIdentity {
        name: config.mcp.client_name.clone(),
        version: config.mcp.client_version.clone(),
        protocol_version: config.mcp.protocol_version.clone(),
    };
    let executor = ToolExecutor::new(transport, cache, audit, client);

    Ok(AppContext::new(executor, connections, verifier))
}

fn build_verifier(
    config: &RelayConfig,
    http: reqwest::Client,
) -> Result<Arc<dyn IdentityVerifier>, ConfigError> {
    match config.auth.mode {
        AuthMode::Static => {
            if config.auth.tokens.is_empty() {
                tracing::warn!("Static auth has no tokens; every lifecycle call will be rejected");
            }
            Ok(Arc::new(StaticIdentityVerifier::new(config.auth.tokens.clone())))
        }
        AuthMode::Remote => {
            let url = config.auth.url.clone().ok_or_else(|| ConfigError::MissingKey {
                key: "SUPABASE_URL".into(),
            })?;
            let key = config
                .auth
                .service_key
                .clone()
                .ok_or_else(|| ConfigError::MissingKey {
                    key: "SUPABASE_SERVICE_ROLE_KEY".into(),
                })?;
            Ok(Arc::new(RemoteIdentityVerifier::new(http, url, key)))
        }
    }
}

/// Bind `config.listen` and serve until Ctrl-C.
pub async fn start_server(config: RelayConfig) -> Result<(), StartupError> {
    let ctx = bootstrap(&config).await?;
    let app = crate::routes::create_router(Arc::new(ctx));

    let listener = TcpListener::bind(&config.listen).await?;
    info!("mcp-relay listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("mcp-relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}
