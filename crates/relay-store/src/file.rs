//! Durable store backed by files in a data directory.
//!
//! `connections.json` holds the whole connection mirror and is rewritten
//! atomically (.tmp → rename) on every change. `tool_calls.jsonl` is an
//! append-only audit log, one entry per line.

use crate::rows;
use relay_types::{
    AuditLog, BoxFuture, ConnectionStatus, ConnectionStore, ManagedConnection, StoreError,
    ToolCallLogEntry,
};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

const CONNECTIONS_FILE: &str = "connections.json";
const AUDIT_FILE: &str = "tool_calls.jsonl";

pub struct FileStore {
    data_dir: PathBuf,
    // Serializes read-modify-write cycles on the connections file.
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open a store, ensuring the data directory exists.
    pub async fn new(data_dir: PathBuf) -> Result<Self, StoreError> {
        tokio::fs::create_dir_all(&data_dir).await?;
        Ok(Self {
            data_dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn connections_path(&self) -> PathBuf {
        self.data_dir.join(CONNECTIONS_FILE)
    }

    fn audit_path(&self) -> PathBuf {
        self.data_dir.join(AUDIT_FILE)
    }

    async fn load_connections(&self) -> Result<Vec<ManagedConnection>, StoreError> {
        let path = self.connections_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let data = tokio::fs::read_to_string(&path).await?;
        if data.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&data)?)
    }

    async fn save_connections(&self, rows: &[ManagedConnection]) -> Result<(), StoreError> {
        let path = self.connections_path();
        let tmp_path = path.with_extension("tmp");
        let json = serde_json::to_string_pretty(rows)?;
        tokio::fs::write(&tmp_path, json).await?;
        tokio::fs::rename(&tmp_path, &path).await?;
        Ok(())
    }

    /// Read the audit log back, skipping lines that fail to parse.
    pub async fn audit_entries(&self) -> Result<Vec<ToolCallLogEntry>, StoreError> {
        let path = self.audit_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let data = tokio::fs::read_to_string(&path).await?;
        let mut entries = Vec::new();
        for (i, line) in data.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::warn!("Skipping malformed audit line {}: {e}", i + 1),
            }
        }
        Ok(entries)
    }
}

impl ConnectionStore for FileStore {
    fn upsert<'a>(
        &'a self,
        connection: ManagedConnection,
    ) -> BoxFuture<'a, Result<ManagedConnection, StoreError>> {
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;
            let mut all = self.load_connections().await?;
            let stored = rows::upsert(&mut all, connection);
            self.save_connections(&all).await?;
            Ok(stored)
        })
    }

    fn list<'a>(
        &'a self,
        caller_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ManagedConnection>, StoreError>> {
        Box::pin(async move {
            let all = self.load_connections().await?;
            Ok(rows::list(&all, caller_id))
        })
    }

    fn update_status<'a>(
        &'a self,
        caller_id: &'a str,
        connection_id: &'a str,
        status: ConnectionStatus,
        authorization_url: Option<String>,
    ) -> BoxFuture<'a, Result<bool, StoreError>> {
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;
            let mut all = self.load_connections().await?;
            let updated =
                rows::update_status(&mut all, caller_id, connection_id, status, authorization_url);
            if updated {
                self.save_connections(&all).await?;
            }
            Ok(updated)
        })
    }

    fn delete<'a>(
        &'a self,
        caller_id: &'a str,
        connection_id: &'a str,
    ) -> BoxFuture<'a, Result<bool, StoreError>> {
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;
            let mut all = self.load_connections().await?;
            let deleted = rows::delete(&mut all, caller_id, connection_id);
            if deleted {
                self.save_connections(&all).await?;
            }
            Ok(deleted)
        })
    }
}

impl AuditLog for FileStore {
    fn append<'a>(&'a self, entry: ToolCallLogEntry) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            let mut line = serde_json::to_string(&entry)?;
            line.push('\n');
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.audit_path())
                .await?;
            file.write_all(line.as_bytes()).await?;
            file.flush().await?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rows::sample;
    use relay_types::{CallStatus, ServerDescriptor};
    use tempfile::TempDir;

    async fn test_store() -> (FileStore, TempDir) {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().join("data")).await.unwrap();
        (store, tmp)
    }

    #[tokio::test]
    async fn connections_survive_reopen() {
        let (store, tmp) = test_store().await;
        store.upsert(sample("u1", "c1")).await.unwrap();
        store
            .update_status("u1", "c1", ConnectionStatus::AuthRequired, Some("https://a".into()))
            .await
            .unwrap();

        let reopened = FileStore::new(tmp.path().join("data")).await.unwrap();
        let rows = reopened.list("u1").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, ConnectionStatus::AuthRequired);
        assert_eq!(rows[0].authorization_url.as_deref(), Some("https://a"));
        assert!(!store.data_dir().join("connections.tmp").exists());
    }

    #[tokio::test]
    async fn list_on_fresh_store_is_empty() {
        let (store, _tmp) = test_store().await;
        assert!(store.list("nobody").await.unwrap().is_empty());
        assert!(store.audit_entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_missing_row_is_false() {
        let (store, _tmp) = test_store().await;
        assert!(!store.delete("u1", "nope").await.unwrap());
        store.upsert(sample("u1", "c1")).await.unwrap();
        assert!(store.delete("u1", "c1").await.unwrap());
        assert!(store.list("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn audit_appends_lines() {
        let (store, _tmp) = test_store().await;
        let server = ServerDescriptor::managed("ns", "c1");
        for status in [CallStatus::Success, CallStatus::Error] {
            let entry =
                ToolCallLogEntry::new("t", &server, &serde_json::json!({"a": 1}), status, "r", 5);
            store.append(entry).await.unwrap();
        }
        let raw = std::fs::read_to_string(store.data_dir().join(AUDIT_FILE)).unwrap();
        assert_eq!(raw.lines().count(), 2);

        let entries = store.audit_entries().await.unwrap();
        assert_eq!(entries[1].status, CallStatus::Error);
        assert_eq!(entries[0].server_url, "smithery://ns/c1");
    }

    #[tokio::test]
    async fn malformed_audit_lines_are_skipped() {
        let (store, _tmp) = test_store().await;
        std::fs::write(store.data_dir().join(AUDIT_FILE), "not json\n").unwrap();
        let entry = ToolCallLogEntry::new(
            "t",
            &ServerDescriptor::new("https://x/mcp"),
            &serde_json::json!({}),
            CallStatus::Success,
            "ok",
            1,
        );
        store.append(entry).await.unwrap();
        assert_eq!(store.audit_entries().await.unwrap().len(), 1);
    }
}
