//! Collaborator ports: persistence, identity and the process-wide cache.
//!
//! All traits are dyn-compatible so the composition root can hand out
//! `Arc<dyn ...>` and tests can substitute in-memory implementations.

use crate::audit::ToolCallLogEntry;
use crate::connection::{CallerIdentity, ConnectionStatus, ManagedConnection};
use crate::error::{AuthError, StoreError};
use std::future::Future;
use std::pin::Pin;

/// A boxed, sendable future returned by the port traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Key-value cache for per-process optimizations (sessions, namespace).
///
/// Entries are never correctness-critical: a miss only causes the
/// handshake or namespace lookup to run again.
pub trait KeyValueCache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn put(&self, key: &str, value: String);

    fn remove(&self, key: &str);
}

/// Persistence for managed connections, keyed by `(caller_id, connection_id)`.
pub trait ConnectionStore: Send + Sync {
    /// Insert or replace the row for `(caller_id, connection_id)`.
    ///
    /// An existing row keeps its `created_at`. Returns the stored row.
    fn upsert<'a>(
        &'a self,
        connection: ManagedConnection,
    ) -> BoxFuture<'a, Result<ManagedConnection, StoreError>>;

    /// All rows for a caller, newest first.
    fn list<'a>(
        &'a self,
        caller_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ManagedConnection>, StoreError>>;

    /// Update status (and authorization URL) of one row. Returns `false` if
    /// no such row exists.
    fn update_status<'a>(
        &'a self,
        caller_id: &'a str,
        connection_id: &'a str,
        status: ConnectionStatus,
        authorization_url: Option<String>,
    ) -> BoxFuture<'a, Result<bool, StoreError>>;

    /// Delete one row scoped to the caller. Returns `false` if it was absent.
    fn delete<'a>(
        &'a self,
        caller_id: &'a str,
        connection_id: &'a str,
    ) -> BoxFuture<'a, Result<bool, StoreError>>;
}

/// Append-only sink for tool execution records.
pub trait AuditLog: Send + Sync {
    fn append<'a>(&'a self, entry: ToolCallLogEntry) -> BoxFuture<'a, Result<(), StoreError>>;
}

/// Resolves a bearer credential to a verified caller.
pub trait IdentityVerifier: Send + Sync {
    fn verify<'a>(&'a self, token: &'a str) -> BoxFuture<'a, Result<CallerIdentity, AuthError>>;
}
