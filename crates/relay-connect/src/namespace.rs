//! Namespace resolution, cached for the life of the process.

use crate::error::ProviderError;
use crate::provider::ConnectionProvider;
use relay_types::KeyValueCache;
use std::sync::Arc;

const NAMESPACE_CACHE_PREFIX: &str = "namespace:";

/// Picks the namespace new connections are registered under.
///
/// Preference order: the configured name if the provider lists it, else the
/// first listed namespace, else the configured name after creating it. A
/// listing failure counts as an empty list; a creation conflict is success.
#[derive(Clone)]
pub struct NamespaceResolver {
    provider: Arc<dyn ConnectionProvider>,
    cache: Arc<dyn KeyValueCache>,
    preferred: String,
}

impl NamespaceResolver {
    pub fn new(
        provider: Arc<dyn ConnectionProvider>,
        cache: Arc<dyn KeyValueCache>,
        preferred: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            cache,
            preferred: preferred.into(),
        }
    }

    pub async fn resolve(&self) -> Result<String, ProviderError> {
        let key = format!("{NAMESPACE_CACHE_PREFIX}{}", self.preferred);
        if let Some(ns) = self.cache.get(&key) {
            return Ok(ns);
        }

        let listed = match self.provider.list_namespaces().await {
            Ok(names) => names,
            Err(e) => {
                tracing::warn!("Listing namespaces failed, will try to create one: {e}");
                Vec::new()
            }
        };

        let chosen = if listed.iter().any(|n| *n == self.preferred) {
            self.preferred.clone()
        } else if let Some(first) = listed.into_iter().next() {
            first
        } else {
            if self.provider.create_namespace(&self.preferred).await? {
                tracing::info!("Created namespace '{}'", self.preferred);
            } else {
                tracing::debug!("Namespace '{}' already exists", self.preferred);
            }
            self.preferred.clone()
        };

        self.cache.put(&key, chosen.clone());
        Ok(chosen)
    }
}
