//! Application state.
//!
//! Shared state for all request handlers.

use std::sync::Arc;

use axum::body::Bytes;

use crate::live_reload::Hub;

/// Application state shared across all handlers.
pub(crate) struct AppState {
    /// Session registry and broadcaster.
    pub(crate) hub: Arc<Hub>,
    /// Client script, loaded once at startup.
    pub(crate) script: Bytes,
    /// Path the script is served at.
    pub(crate) script_path: String,
    /// Content type of the script.
    pub(crate) script_mime: &'static str,
}
