//! Rolling provider metrics.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::state::AppState;

pub const DEFAULT_WINDOW_HOURS: u64 = 24;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/stats", get(get_stats))
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub hours: Option<u64>,
}

/// GET /api/stats?hours=N — per-provider aggregates over the trailing window.
async fn get_stats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatsQuery>,
) -> Json<serde_json::Value> {
    let window_hours = query.hours.unwrap_or(DEFAULT_WINDOW_HOURS);
    let providers = state.gateway.stats(window_hours);

    Json(serde_json::json!({
        "windowHours": window_hours,
        "providers": providers,
    }))
}
