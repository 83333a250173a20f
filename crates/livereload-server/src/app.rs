//! Router construction.
//!
//! Builds the axum router with the upgrade route and the static fallback.

use std::sync::Arc;

use axum::Router;
use axum::routing::any;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::live_reload;
use crate::state::AppState;
use crate::static_files;

/// Create the application router.
///
/// # Arguments
///
/// * `state` - Shared application state
/// * `upgrade_path` - Path at which WebSocket upgrades are accepted
pub(crate) fn create_router(state: Arc<AppState>, upgrade_path: &str) -> Router {
    Router::new()
        // Any method, so that non-upgrade requests fall through to the 404
        .route(upgrade_path, any(live_reload::ws_handler))
        .fallback(static_files::serve_asset)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
