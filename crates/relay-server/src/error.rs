//! HTTP error mapping and startup failures.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use relay_connect::LifecycleError;
use relay_mcp::McpError;
use relay_types::{AuthError, ConfigError, StoreError};
use serde::Serialize;
use thiserror::Error;

/// Error returned by handlers; rendered as `{ "error": "<message>" }`.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Caller input was missing or malformed.
    #[error("{0}")]
    BadRequest(String),

    /// Missing or rejected bearer credential.
    #[error("{0}")]
    Unauthorized(String),

    /// The provider or an MCP server failed.
    #[error("{0}")]
    BadGateway(String),

    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl HttpError {
    pub fn status(&self) -> StatusCode {
        match self {
            HttpError::BadRequest(_) => StatusCode::BAD_REQUEST,
            HttpError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            HttpError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            HttpError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{} {self}", status.as_u16());
        }
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<AuthError> for HttpError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingHeader | AuthError::InvalidToken => {
                HttpError::Unauthorized(err.to_string())
            }
            AuthError::Backend(_) => HttpError::Internal(err.to_string()),
        }
    }
}

impl From<LifecycleError> for HttpError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::InvalidInput(msg) => HttpError::BadRequest(msg),
            LifecycleError::Auth(auth) => auth.into(),
            LifecycleError::Config(_) | LifecycleError::Store(_) => {
                HttpError::Internal(err.to_string())
            }
            LifecycleError::Provider(msg) => HttpError::BadGateway(msg),
            LifecycleError::Transport(_) => HttpError::BadGateway(err.to_string()),
        }
    }
}

/// Failures while building the composition root or binding the listener.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Transport(#[from] McpError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_errors_map_to_statuses() {
        let cases = [
            (LifecycleError::InvalidInput("connectionId is required".into()), 400),
            (LifecycleError::Auth(AuthError::InvalidToken), 401),
            (
                LifecycleError::Config(ConfigError::MissingKey {
                    key: "SMITHERY_API_KEY".into(),
                }),
                500,
            ),
            (LifecycleError::Provider("Retry failed: gone".into()), 502),
            (LifecycleError::Transport(McpError::Network("reset".into())), 502),
            (LifecycleError::Store(StoreError::Backend("disk".into())), 500),
        ];
        for (err, expected) in cases {
            assert_eq!(HttpError::from(err).status().as_u16(), expected);
        }
    }

    #[test]
    fn auth_backend_failure_is_internal() {
        let err = HttpError::from(AuthError::Backend("HTTP 503".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn message_is_not_prefixed() {
        let err = HttpError::from(LifecycleError::InvalidInput(
            "mcpUrl and displayName are required".into(),
        ));
        assert_eq!(err.to_string(), "mcpUrl and displayName are required");
    }
}
