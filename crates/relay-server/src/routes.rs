//! Router construction.

use std::any::Any as PanicPayload;

use axum::Router;
use axum::http::{HeaderName, Method, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::HttpError;
use crate::handlers;
use crate::state::AppState;

/// Any origin, with the headers browser clients send. The layer answers
/// every `OPTIONS` request itself with an empty 200.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
        ])
}

fn panic_response(payload: Box<dyn PanicPayload + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!("Handler panicked: {detail}");
    HttpError::Internal("Internal server error".into()).into_response()
}

/// A panicking handler answers 500 `{error}` instead of dropping the connection.
fn panic_layer() -> CatchPanicLayer<fn(Box<dyn PanicPayload + Send + 'static>) -> Response> {
    CatchPanicLayer::custom(panic_response as fn(_) -> _)
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/v1/tool-call", post(handlers::relay::tool_call))
        .route("/v1/connect", post(handlers::connect::dispatch))
        .route("/v1/token", post(handlers::connect::token))
        .layer(panic_layer())
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
