//! Persistence backends for mcp-relay.
//!
//! [`MemoryStore`] keeps everything in process and is what tests use;
//! [`FileStore`] persists the connection mirror as one JSON document and the
//! audit log as JSON lines under a data directory. [`MemoryCache`] backs the
//! session and namespace caches.

mod cache;
mod file;
mod memory;
mod rows;

pub use cache::MemoryCache;
pub use file::FileStore;
pub use memory::MemoryStore;
