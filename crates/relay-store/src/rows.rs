//! Row operations on the connection mirror shared by every backend.

use chrono::Utc;
use relay_types::{ConnectionStatus, ManagedConnection};

fn same_key(row: &ManagedConnection, caller_id: &str, connection_id: &str) -> bool {
    row.caller_id == caller_id && row.connection_id == connection_id
}

/// Insert or replace; a replaced row keeps its original `created_at`.
pub(crate) fn upsert(rows: &mut Vec<ManagedConnection>, mut conn: ManagedConnection) -> ManagedConnection {
    match rows
        .iter_mut()
        .find(|r| same_key(r, &conn.caller_id, &conn.connection_id))
    {
        Some(existing) => {
            conn.created_at = existing.created_at;
            *existing = conn.clone();
        }
        None => rows.push(conn.clone()),
    }
    conn
}

/// A caller's rows, newest first.
pub(crate) fn list(rows: &[ManagedConnection], caller_id: &str) -> Vec<ManagedConnection> {
    let mut out: Vec<ManagedConnection> = rows
        .iter()
        .filter(|r| r.caller_id == caller_id)
        .cloned()
        .collect();
    out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    out
}

pub(crate) fn update_status(
    rows: &mut [ManagedConnection],
    caller_id: &str,
    connection_id: &str,
    status: ConnectionStatus,
    authorization_url: Option<String>,
) -> bool {
    match rows.iter_mut().find(|r| same_key(r, caller_id, connection_id)) {
        Some(row) => {
            row.status = status;
            row.authorization_url = authorization_url;
            row.updated_at = Utc::now();
            true
        }
        None => false,
    }
}

pub(crate) fn delete(rows: &mut Vec<ManagedConnection>, caller_id: &str, connection_id: &str) -> bool {
    let before = rows.len();
    rows.retain(|r| !same_key(r, caller_id, connection_id));
    rows.len() != before
}

#[cfg(test)]
pub(crate) fn sample(caller_id: &str, connection_id: &str) -> ManagedConnection {
    let now = Utc::now();
    ManagedConnection {
        caller_id: caller_id.into(),
        connection_id: connection_id.into(),
        namespace: "n4-app".into(),
        mcp_url: "https://server.smithery.ai/exa".into(),
        display_name: "Exa".into(),
        status: ConnectionStatus::Connected,
        authorization_url: None,
        created_at: now,
        updated_at: now,
    }
}
