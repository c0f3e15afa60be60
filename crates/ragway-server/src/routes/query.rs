//! Question answering through the gateway.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use ragway_chat::{ConfigurationError, ProviderError};
use ragway_runtime::{AgentContext, ExecutionMode, GatewayError, ProviderTarget, QueryOptions};
use serde::Deserialize;
use serde_json::json;

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/query", post(query))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    #[serde(default)]
    pub agent_context: AgentContext,
    pub question: String,
    #[serde(default)]
    pub mode: ExecutionMode,
    #[serde(default)]
    pub providers: Vec<ProviderTarget>,
}

/// POST /api/query — single-provider answer or fan-out comparison.
async fn query(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> impl IntoResponse {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => {
            return (
                rejection.status(),
                Json(json!({ "error": rejection.body_text(), "kind": "invalid_request" })),
            )
        }
    };

    if req.question.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "question must not be empty", "kind": "invalid_request" })),
        );
    }

    let options = QueryOptions {
        mode: req.mode,
        providers: req.providers,
    };

    match state.gateway.query(&req.agent_context, &req.question, options).await {
        Ok(response) => (StatusCode::OK, Json(json!(response))),
        Err(e) => error_response(&e),
    }
}

fn error_response(error: &GatewayError) -> (StatusCode, Json<serde_json::Value>) {
    match error {
        GatewayError::Configuration(e) => {
            let mut body = json!({ "error": e.to_string(), "kind": e.kind() });
            if let ConfigurationError::ModelNotAllowed { allowed, .. } = e {
                body["allowedModels"] = json!(allowed);
            }
            (StatusCode::BAD_REQUEST, Json(body))
        }
        GatewayError::Provider {
            provider,
            model,
            source,
        } => {
            let status = match source {
                ProviderError::Timeout => StatusCode::GATEWAY_TIMEOUT,
                ProviderError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                ProviderError::Unauthorized | ProviderError::Unknown { .. } => StatusCode::BAD_GATEWAY,
            };
            (
                status,
                Json(json!({
                    "error": error.to_string(),
                    "kind": source.kind(),
                    "provider": provider,
                    "model": model,
                })),
            )
        }
    }
}
