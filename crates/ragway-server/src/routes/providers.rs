//! Read-only registry and model catalogue.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use ragway_chat::{Provider, TaskType};
use serde::Deserialize;
use serde_json::json;

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/llm/providers", get(list_providers))
        .route("/llm/models", get(list_models))
        .route("/llm/recommend", get(recommend))
}

/// GET /api/llm/providers — whitelist, default model and credential presence.
async fn list_providers(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let registry = state.gateway.registry();
    Json(json!({
        "providers": registry.providers(),
        "enabled": registry.enabled_providers(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ModelsQuery {
    pub provider: Option<String>,
}

/// GET /api/llm/models?provider=name — catalogue, optionally for one provider.
async fn list_models(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ModelsQuery>,
) -> impl IntoResponse {
    let registry = state.gateway.registry();
    match query.provider.as_deref() {
        None => (StatusCode::OK, Json(json!({ "models": registry.catalogue() }))),
        Some(name) => match Provider::parse(name) {
            Some(provider) => (
                StatusCode::OK,
                Json(json!({ "provider": provider, "models": registry.models(provider) })),
            ),
            None => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": format!("unknown provider '{}'", name),
                    "kind": "unknown_provider",
                })),
            ),
        },
    }
}

#[derive(Debug, Deserialize)]
pub struct RecommendQuery {
    pub task: Option<String>,
}

/// GET /api/llm/recommend?task=coding — preferred credentialed provider for a task.
async fn recommend(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RecommendQuery>,
) -> impl IntoResponse {
    let task = match query.task.as_deref() {
        None => TaskType::default(),
        Some(name) => match TaskType::parse(name) {
            Some(task) => task,
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "error": format!("unknown task type '{}'", name),
                        "kind": "unknown_task",
                    })),
                )
            }
        },
    };

    match state.gateway.registry().recommend(task) {
        Ok(target) => (
            StatusCode::OK,
            Json(json!({
                "task": task,
                "provider": target.provider,
                "model": target.model,
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": e.to_string(), "kind": e.kind() })),
        ),
    }
}
