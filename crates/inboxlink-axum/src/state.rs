//! Shared application state type.

use crate::bootstrap::AxumContext;
use std::sync::Arc;

/// Application state shared across all handlers.
///
/// Holds the bridge service and the downstream stream responder.
pub type AppState = Arc<AxumContext>;
