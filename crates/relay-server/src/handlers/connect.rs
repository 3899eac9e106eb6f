//! Connection lifecycle and token endpoints.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use relay_connect::{CreateConnection, TokenOutcome};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{authenticate, parse_body};
use crate::error::HttpError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub action: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Create,
    List,
    Remove,
    Retry,
    Verify,
    ListTools,
}

impl Action {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "create" => Some(Action::Create),
            "list" => Some(Action::List),
            "remove" => Some(Action::Remove),
            "retry" => Some(Action::Retry),
            "verify" => Some(Action::Verify),
            "list-tools" => Some(Action::ListTools),
            _ => None,
        }
    }
}

/// Body of `remove`, `retry` and `verify`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectionRef {
    #[serde(default)]
    connection_id: String,
}

fn to_json<T: Serialize>(value: T) -> Result<Json<Value>, HttpError> {
    serde_json::to_value(value)
        .map(Json)
        .map_err(|e| HttpError::Internal(format!("Failed to encode response: {e}")))
}

/// `POST /v1/connect?action=...`
///
/// The action is checked first, then the caller's identity, then the body.
pub async fn dispatch(
    State(state): State<AppState>,
    Query(query): Query<ConnectQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, HttpError> {
    let raw = query.action.unwrap_or_default();
    let action =
        Action::parse(&raw).ok_or_else(|| HttpError::BadRequest(format!("Unknown action: {raw}")))?;
    let caller = authenticate(&state, &headers).await?;
    let manager = &state.connections;

    match action {
        Action::Create => {
            let request: CreateConnection = parse_body(&body)?;
            to_json(manager.create(&caller, request).await?)
        }
        Action::List => {
            let connections = manager.list(&caller).await?;
            Ok(Json(json!({ "connections": connections })))
        }
        Action::Remove => {
            let target: ConnectionRef = parse_body(&body)?;
            manager.remove(&caller, &target.connection_id).await?;
            Ok(Json(json!({ "success": true })))
        }
        Action::Retry => {
            let target: ConnectionRef = parse_body(&body)?;
            to_json(manager.retry(&caller, &target.connection_id).await?)
        }
        Action::Verify => {
            let target: ConnectionRef = parse_body(&body)?;
            to_json(manager.verify(&caller, &target.connection_id).await?)
        }
        Action::ListTools => to_json(manager.list_tools(&caller).await?),
    }
}

/// `POST /v1/token`
pub async fn token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<TokenOutcome>, HttpError> {
    let caller = authenticate(&state, &headers).await?;
    Ok(Json(state.connections.mint_token(&caller).await?))
}
