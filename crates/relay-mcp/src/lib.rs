//! MCP relay core: credential resolution, JSON-RPC over HTTP, session
//! handshakes and audited tool execution.
//!
//! Each tool call flows executor → session manager → transport → credential
//! resolver. Responses may arrive as plain JSON or as a server-sent event
//! stream; both are normalized to a single JSON-RPC result.

pub mod credentials;
pub mod error;
pub mod executor;
pub mod jsonrpc;
pub mod result;
pub mod session;
pub mod sse;
pub mod tools;
pub mod transport;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use credentials::{CredentialResolver, ResolvedTarget, SESSION_HEADER, SecretStore};
pub use error::McpError;
pub use executor::ToolExecutor;
pub use result::normalize_tool_result;
pub use session::{ClientIdentity, SessionManager};
pub use tools::{McpToolInfo, parse_tool_list};
pub use transport::{HttpTransport, RpcResponse, RpcTransport};
