//! HTTP routes: group creation and the websocket endpoint.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;

use crate::state::{AppState, CreatedGroup};
use crate::ws;

/// Create a group and hand out its join code.
///
/// POST /api/groups
pub async fn create_group(State(state): State<Arc<AppState>>) -> (StatusCode, Json<CreatedGroup>) {
    let created = state.create_group().await;
    (StatusCode::CREATED, Json(created))
}

/// Routes without middleware; `main` adds tracing and CORS layers
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/groups", post(create_group))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
}
