//! Request and response types for the gateway.

use ragway_chat::Provider;
use ragway_core::ChatMessage;
use serde::{Deserialize, Serialize};

use crate::compare::ComparisonResult;

/// Single-provider or concurrent multi-provider execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExecutionMode {
    #[default]
    Single,
    FanOut,
}

/// A requested provider with an optional model override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderTarget {
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ProviderTarget {
    pub fn new(provider: impl Into<String>, model: Option<&str>) -> Self {
        Self {
            provider: provider.into(),
            model: model.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    /// Empty in single mode selects the registry's default provider.
    pub targets: Vec<ProviderTarget>,
    pub mode: ExecutionMode,
}

impl ChatRequest {
    pub fn single(messages: Vec<ChatMessage>, target: Option<ProviderTarget>) -> Self {
        Self {
            messages,
            targets: target.into_iter().collect(),
            mode: ExecutionMode::Single,
        }
    }

    pub fn fan_out(messages: Vec<ChatMessage>, targets: Vec<ProviderTarget>) -> Self {
        Self {
            messages,
            targets,
            mode: ExecutionMode::FanOut,
        }
    }
}

/// Mode and targets for [`crate::Gateway::query`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct QueryOptions {
    #[serde(default)]
    pub mode: ExecutionMode,
    #[serde(default)]
    pub providers: Vec<ProviderTarget>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleResponse {
    pub provider: Provider,
    pub model: String,
    pub response: String,
    pub cached: bool,
    pub latency_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_count: Option<u64>,
}

/// A successful provider answer within a fan-out.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderResponse {
    pub provider: Provider,
    pub model: String,
    pub response: String,
    pub latency_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_count: Option<u64>,
}

/// A failed provider call within a fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderFailure {
    pub provider: Provider,
    pub model: String,
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FanOutResponse {
    /// Successes in request order.
    pub responses: Vec<ProviderResponse>,
    /// Failures in request order.
    pub errors: Vec<ProviderFailure>,
    /// Absent when every provider failed.
    pub comparison: Option<ComparisonResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum GatewayResponse {
    Single(SingleResponse),
    FanOut(FanOutResponse),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub reachable_providers: Vec<Provider>,
}

/// Per-request lifecycle, logged at debug level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Validating,
    CacheCheck,
    Dispatching,
    Comparing,
    Recording,
    Done,
    Error,
}

