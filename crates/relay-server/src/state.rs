//! Shared application state type.

use crate::bootstrap::AppContext;
use std::sync::Arc;

/// State handed to every handler.
pub type AppState = Arc<AppContext>;
