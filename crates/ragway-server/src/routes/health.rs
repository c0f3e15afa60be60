use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use ragway_runtime::HealthReport;

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(get_health))
}

/// GET /api/health — credentialed providers; no upstream calls.
async fn get_health(State(state): State<Arc<AppState>>) -> Json<HealthReport> {
    Json(state.gateway.health())
}
