//! In-process connection mirror and audit log.

use crate::rows;
use relay_types::{
    AuditLog, BoxFuture, ConnectionStatus, ConnectionStore, ManagedConnection, StoreError,
    ToolCallLogEntry,
};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct MemoryStore {
    connections: Mutex<Vec<ManagedConnection>>,
    audit: Mutex<Vec<ToolCallLogEntry>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the audit log, oldest first.
    pub fn audit_entries(&self) -> Vec<ToolCallLogEntry> {
        lock(&self.audit).clone()
    }

    /// Snapshot of every stored connection regardless of caller.
    pub fn connections(&self) -> Vec<ManagedConnection> {
        lock(&self.connections).clone()
    }
}

impl ConnectionStore for MemoryStore {
    fn upsert<'a>(
        &'a self,
        connection: ManagedConnection,
    ) -> BoxFuture<'a, Result<ManagedConnection, StoreError>> {
        Box::pin(async move { Ok(rows::upsert(&mut lock(&self.connections), connection)) })
    }

    fn list<'a>(
        &'a self,
        caller_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ManagedConnection>, StoreError>> {
        Box::pin(async move { Ok(rows::list(&lock(&self.connections), caller_id)) })
    }

    fn update_status<'a>(
        &'a self,
        caller_id: &'a str,
        connection_id: &'a str,
        status: ConnectionStatus,
        authorization_url: Option<String>,
    ) -> BoxFuture<'a, Result<bool, StoreError>> {
        Box::pin(async move {
            Ok(rows::update_status(
                &mut lock(&self.connections),
                caller_id,
                connection_id,
                status,
                authorization_url,
            ))
        })
    }

    fn delete<'a>(
        &'a self,
        caller_id: &'a str,
        connection_id: &'a str,
    ) -> BoxFuture<'a, Result<bool, StoreError>> {
        Box::pin(async move {
            Ok(rows::delete(
                &mut lock(&self.connections),
                caller_id,
                connection_id,
            ))
        })
    }
}

impl AuditLog for MemoryStore {
    fn append<'a>(&'a self, entry: ToolCallLogEntry) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            lock(&self.audit).push(entry);
            Ok(())
        })
    }
}
