//! Axum adapter exposing the relay over HTTP.
//!
//! Routes:
//! - `POST /v1/tool-call` runs one tool through the [`ToolExecutor`](relay_mcp::ToolExecutor)
//! - `POST /v1/connect?action=...` drives the managed-connection lifecycle
//! - `POST /v1/token` mints a provider token scoped to the caller
//! - `GET /health`
//!
//! Every route answers CORS preflight.

#![deny(unsafe_code)]

pub mod bootstrap;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use bootstrap::{AppContext, bootstrap, start_server};
pub use error::{HttpError, StartupError};
pub use routes::create_router;
pub use state::AppState;
