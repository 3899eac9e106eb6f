//! Tool relay endpoint.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use relay_types::ServerDescriptor;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::HttpError;
use crate::state::AppState;

const REQUIRED: &str = "toolName and server are required";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolCallRequest {
    #[serde(default)]
    tool_name: Option<String>,
    #[serde(default)]
    arguments: Option<Value>,
    #[serde(default)]
    server: Option<Value>,
}

/// `POST /v1/tool-call`
///
/// Tool failures come back as a 200 whose `result` starts with `Error:`;
/// only a malformed request is rejected.
pub async fn tool_call(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, HttpError> {
    let request: ToolCallRequest = super::parse_body(&body)?;

    let tool_name = request
        .tool_name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| HttpError::BadRequest(REQUIRED.into()))?;
    let server: ServerDescriptor = match request.server {
        Some(value @ Value::Object(_)) => descriptor_from(value),
        _ => return Err(HttpError::BadRequest(REQUIRED.into())),
    };
    let arguments = match request.arguments {
        None | Some(Value::Null) => json!({}),
        Some(args) => args,
    };

    tracing::debug!("tool-call {tool_name} -> {}", server.url);
    let result = state.executor.execute(&server, &tool_name, arguments).await;
    Ok(Json(json!({ "result": result })))
}

/// Read a server object. Fields of the wrong type are dropped so the
/// executor rejects the descriptor and the attempt is still audited.
fn descriptor_from(value: Value) -> ServerDescriptor {
    match serde_json::from_value::<ServerDescriptor>(value.clone()) {
        Ok(server) => server,
        Err(e) => {
            tracing::debug!("Lenient server descriptor: {e}");
            let field = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);
            ServerDescriptor {
                url: field("url").unwrap_or_default(),
                api_key: field("apiKey"),
                config: value
                    .get("config")
                    .or_else(|| value.get("providerConfig"))
                    .and_then(Value::as_object)
                    .cloned(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_url_reads_as_empty() {
        let server = descriptor_from(json!({"apiKey": "k"}));
        assert_eq!(server.url, "");
        assert_eq!(server.api_key.as_deref(), Some("k"));
    }

    #[test]
    fn mistyped_fields_are_dropped() {
        let server = descriptor_from(json!({"url": 42, "apiKey": "k", "config": "nope"}));
        assert_eq!(server.url, "");
        assert_eq!(server.api_key.as_deref(), Some("k"));
        assert!(server.config.is_none());
        assert!(server.kind().is_err());
    }
}
