//! Data types for cache rows, metric records and aggregates.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A persisted response cache row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCacheEntry {
    pub cache_key: String,
    pub response: String,
    pub provider: String,
    pub model: String,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
}

/// Where a recorded response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricSource {
    /// A provider call was made.
    Live,
    /// Served from the response cache; no provider call.
    Cache,
}

impl MetricSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricSource::Live => "live",
            MetricSource::Cache => "cache",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "cache" => MetricSource::Cache,
            _ => MetricSource::Live,
        }
    }
}

/// One dispatch attempt, as handed to the metrics collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEvent {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub provider: String,
    pub model: String,
    pub latency_ms: f64,
    pub success: bool,
    pub source: MetricSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl MetricEvent {
    /// A live provider call, timestamped now.
    pub fn live(
        provider: impl Into<String>,
        model: impl Into<String>,
        latency: Duration,
        success: bool,
    ) -> Self {
        Self {
            timestamp: ragway_core::now_millis(),
            provider: provider.into(),
            model: model.into(),
            latency_ms: latency.as_secs_f64() * 1000.0,
            success,
            source: MetricSource::Live,
            token_count: None,
            metadata: None,
        }
    }

    /// A response served from cache: zero latency, always successful.
    pub fn cache_hit(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            source: MetricSource::Cache,
            metadata: Some(serde_json::json!({ "source": "cache" })),
            ..Self::live(provider, model, Duration::ZERO, true)
        }
    }

    pub fn with_token_count(mut self, token_count: Option<u64>) -> Self {
        self.token_count = token_count;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// A metric row read back from the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub id: i64,
    #[serde(flatten)]
    pub event: MetricEvent,
}

/// Rolling per-provider aggregate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderStats {
    #[serde(rename = "requestCount")]
    pub request_count: u64,
    #[serde(rename = "avgLatencyMs")]
    pub avg_latency_ms: f64,
    /// `successes / request_count`, 0 when there were no requests.
    #[serde(rename = "successRate")]
    pub success_rate: f64,
    #[serde(rename = "cacheHits")]
    pub cache_hits: u64,
}

impl ProviderStats {
    pub fn from_counts(
        request_count: u64,
        avg_latency_ms: f64,
        success_count: u64,
        cache_hits: u64,
    ) -> Self {
        let success_rate = if request_count == 0 {
            0.0
        } else {
            success_count as f64 / request_count as f64
        };
        Self {
            request_count,
            avg_latency_ms,
            success_rate,
            cache_hits,
        }
    }
}
