//! Static file serving.
//!
//! Exactly one resource is served: the client script, on `GET` at the
//! configured script path. Every other request gets a 404.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

/// Serve the client script or fall back to 404.
pub(crate) async fn serve_asset(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
) -> Response {
    if method == Method::GET && uri.path() == state.script_path {
        return (
            StatusCode::OK,
            [(header::CONTENT_TYPE, state.script_mime)],
            state.script.clone(),
        )
            .into_response();
    }

    not_found()
}

/// 404 with the standard reason phrase as body.
pub(crate) fn not_found() -> Response {
    let reason = StatusCode::NOT_FOUND.canonical_reason().unwrap_or_default();
    (StatusCode::NOT_FOUND, reason).into_response()
}
