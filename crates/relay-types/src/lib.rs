//! Shared data model, collaborator ports and error hierarchy for mcp-relay.

pub mod audit;
pub mod connection;
pub mod descriptor;
pub mod error;
pub mod ports;
pub mod util;

pub use audit::{CallStatus, MAX_LOGGED_RESULT_CHARS, ToolCallLogEntry};
pub use connection::{CallerIdentity, ConnectionStatus, ManagedConnection};
pub use descriptor::{
    GenericServer, MANAGED_SCHEME, ManagedServer, ServerDescriptor, ServerKind, SessionKey,
};
pub use error::{AuthError, ConfigError, DescriptorError, StoreError};
pub use ports::{AuditLog, BoxFuture, ConnectionStore, IdentityVerifier, KeyValueCache};
