//! Request handlers.

pub mod connect;
pub mod relay;

use axum::Json;
use axum::body::Bytes;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use relay_types::{AuthError, CallerIdentity};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::bootstrap::AppContext;
use crate::error::HttpError;

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Verify the `Authorization: Bearer <token>` header.
pub(crate) async fn authenticate(
    ctx: &AppContext,
    headers: &HeaderMap,
) -> Result<CallerIdentity, HttpError> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.strip_prefix("Bearer ").unwrap_or(v).trim())
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingHeader)?;
    Ok(ctx.verifier.verify(token).await?)
}

/// Decode a JSON body; an empty body decodes as `T::default()`.
pub(crate) fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, HttpError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| HttpError::BadRequest(format!("Invalid JSON body: {e}")))
}
