//! Lifecycle of provider-managed MCP connections.
//!
//! [`ConnectionManager`] mirrors connection state held by the provider into
//! the local [`ConnectionStore`](relay_types::ConnectionStore): it creates,
//! lists, re-checks and removes connections, aggregates their tools and mints
//! scoped provider tokens. The provider is reached through the
//! [`ConnectionProvider`] trait; [`SmitheryClient`] is the REST implementation.

pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod namespace;
pub mod provider;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

#[cfg(test)]
mod lifecycle_tests;

pub use error::{LifecycleError, ProviderError};
pub use identity::{RemoteIdentityVerifier, StaticIdentityVerifier};
pub use lifecycle::{
    CatalogTool, ConnectionManager, CreateConnection, CreateOutcome, ServerSummary,
    StatusOutcome, TokenOutcome, ToolCatalog,
};
pub use namespace::NamespaceResolver;
pub use provider::{
    ConnectionProvider, NewConnection, ProviderConnection, ScopedToken, SmitheryClient,
    TokenRequest,
};
