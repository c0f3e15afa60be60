//! Gateway: validate → cache check → dispatch → compare → record.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use ragway_chat::{ConfigurationError, Provider, ProviderError, ProviderRegistry, ResolvedTarget};
use ragway_core::ChatMessage;
use ragway_store::{MetricEvent, MetricsCollector, ProviderStats, ResponseCache};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::compare::compare_responses;
use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::prompt::{build_messages, AgentContext};
use crate::types::*;

/// Errors surfaced to the caller. Cache and metrics failures never are.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("{provider}/{model}: {source}")]
    Provider {
        provider: Provider,
        model: String,
        #[source]
        source: ProviderError,
    },
}

/// Tracks a request through its phases.
struct PhaseLog {
    request_id: Uuid,
    phase: RequestPhase,
}

impl PhaseLog {
    fn start() -> Self {
        let log = Self {
            request_id: Uuid::new_v4(),
            phase: RequestPhase::Validating,
        };
        debug!("[{}] {:?}", log.request_id, log.phase);
        log
    }

    fn enter(&mut self, next: RequestPhase) {
        debug!("[{}] {:?} -> {:?}", self.request_id, self.phase, next);
        self.phase = next;
    }
}

pub struct Gateway {
    registry: Arc<ProviderRegistry>,
    dispatcher: Dispatcher,
    cache: Arc<ResponseCache>,
    metrics: Arc<MetricsCollector>,
    cache_max_age: Duration,
}

impl Gateway {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        dispatcher: Dispatcher,
        cache: Arc<ResponseCache>,
        metrics: Arc<MetricsCollector>,
        cache_max_age: Duration,
    ) -> Self {
        info!(
            "Gateway ready: providers={:?}, timeout={:?}, cache_max_age={:?}, persistent_cache={}, metrics={}",
            registry.enabled_providers(),
            dispatcher.timeout(),
            cache_max_age,
            cache.is_persistent(),
            metrics.is_enabled()
        );
        Self {
            registry,
            dispatcher,
            cache,
            metrics,
            cache_max_age,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Answer a question on behalf of an agent.
    pub async fn query(
        &self,
        agent_context: &AgentContext,
        question: &str,
        options: QueryOptions,
    ) -> Result<GatewayResponse, GatewayError> {
        let request = ChatRequest {
            messages: build_messages(agent_context, question),
            targets: options.providers,
            mode: options.mode,
        };
        self.execute(request).await
    }

    pub async fn execute(&self, request: ChatRequest) -> Result<GatewayResponse, GatewayError> {
        let mut phase = PhaseLog::start();

        let targets = match self.validate(&request) {
            Ok(targets) => targets,
            Err(e) => {
                phase.enter(RequestPhase::Error);
                warn!("Rejected request: {}", e);
                return Err(e.into());
            }
        };

        match (request.mode, targets.as_slice()) {
            (ExecutionMode::Single, [target]) => self
                .execute_single(&mut phase, target, &request.messages)
                .await
                .map(GatewayResponse::Single),
            _ => Ok(GatewayResponse::FanOut(
                self.execute_fan_out(&mut phase, &targets, &request.messages).await,
            )),
        }
    }

    /// Resolve every target up front so nothing is sent for a bad request.
    fn validate(&self, request: &ChatRequest) -> Result<Vec<ResolvedTarget>, ConfigurationError> {
        match request.mode {
            ExecutionMode::Single => match request.targets.as_slice() {
                [] => Ok(vec![self.registry.default_target()?]),
                [t] => Ok(vec![self.registry.resolve(&t.provider, t.model.as_deref())?]),
                many => Err(ConfigurationError::TooManyTargets(many.len())),
            },
            ExecutionMode::FanOut => {
                if request.targets.is_empty() {
                    return Err(ConfigurationError::NoProviders);
                }
                let mut seen = HashSet::new();
                let mut resolved = Vec::with_capacity(request.targets.len());
                for t in &request.targets {
                    let target = self.registry.resolve(&t.provider, t.model.as_deref())?;
                    if !seen.insert(target.provider) {
                        return Err(ConfigurationError::DuplicateProvider(target.provider));
                    }
                    resolved.push(target);
                }
                Ok(resolved)
            }
        }
    }

    async fn execute_single(
        &self,
        phase: &mut PhaseLog,
        target: &ResolvedTarget,
        messages: &[ChatMessage],
    ) -> Result<SingleResponse, GatewayError> {
        phase.enter(RequestPhase::CacheCheck);
        let provider = target.provider.as_str();
        if let Some(text) = self.cache.get(provider, &target.model, messages, self.cache_max_age) {
            phase.enter(RequestPhase::Recording);
            self.metrics.record(MetricEvent::cache_hit(provider, &target.model));
            phase.enter(RequestPhase::Done);
            return Ok(SingleResponse {
                provider: target.provider,
                model: target.model.clone(),
                response: text,
                cached: true,
                latency_ms: 0.0,
                token_count: None,
            });
        }

        phase.enter(RequestPhase::Dispatching);
        let outcome = self.dispatcher.dispatch_one(target, messages).await;
        self.record(&outcome);

        match outcome.result {
            Ok(completion) => {
                phase.enter(RequestPhase::Recording);
                self.cache.set(provider, &target.model, messages, &completion.text);
                phase.enter(RequestPhase::Done);
                Ok(SingleResponse {
                    provider: target.provider,
                    model: target.model.clone(),
                    response: completion.text,
                    cached: false,
                    latency_ms: millis(outcome.latency),
                    token_count: completion.token_count,
                })
            }
            Err(source) => {
                phase.enter(RequestPhase::Error);
                Err(GatewayError::Provider {
                    provider: target.provider,
                    model: target.model.clone(),
                    source,
                })
            }
        }
    }

    async fn execute_fan_out(
        &self,
        phase: &mut PhaseLog,
        targets: &[ResolvedTarget],
        messages: &[ChatMessage],
    ) -> FanOutResponse {
        phase.enter(RequestPhase::Dispatching);
        let outcomes = self.dispatcher.dispatch_many(targets, messages).await;

        let mut responses = Vec::new();
        let mut errors = Vec::new();
        for outcome in &outcomes {
            match &outcome.result {
                Ok(completion) => responses.push(ProviderResponse {
                    provider: outcome.target.provider,
                    model: outcome.target.model.clone(),
                    response: completion.text.clone(),
                    latency_ms: millis(outcome.latency),
                    token_count: completion.token_count,
                }),
                Err(e) => errors.push(ProviderFailure {
                    provider: outcome.target.provider,
                    model: outcome.target.model.clone(),
                    kind: e.kind().to_string(),
                    message: e.to_string(),
                }),
            }
        }

        phase.enter(RequestPhase::Comparing);
        let comparison = (!responses.is_empty()).then(|| compare_responses(&responses));

        phase.enter(RequestPhase::Recording);
        for outcome in &outcomes {
            self.record(outcome);
        }
        for r in &responses {
            self.cache.set(r.provider.as_str(), &r.model, messages, &r.response);
        }

        phase.enter(RequestPhase::Done);
        info!(
            "Fan-out finished: {} succeeded, {} failed",
            responses.len(),
            errors.len()
        );
        FanOutResponse {
            responses,
            errors,
            comparison,
        }
    }

    fn record(&self, outcome: &DispatchOutcome) {
        let event = MetricEvent::live(
            outcome.target.provider.as_str(),
            &outcome.target.model,
            outcome.latency,
            outcome.result.is_ok(),
        );
        let event = match &outcome.result {
            Ok(completion) => event.with_token_count(completion.token_count),
            Err(e) => event.with_metadata(json!({ "error": e.kind(), "message": e.to_string() })),
        };
        self.metrics.record(event);
    }

    /// Per-provider aggregates. Degrades to empty if the store is unreadable.
    pub fn stats(&self, window_hours: u64) -> BTreeMap<String, ProviderStats> {
        self.metrics.aggregate(window_hours).unwrap_or_else(|e| {
            warn!("Metrics aggregate failed: {}", e);
            BTreeMap::new()
        })
    }

    /// Providers with credentials; no network probe.
    pub fn health(&self) -> HealthReport {
        let reachable_providers = self.registry.enabled_providers();
        HealthReport {
            status: if reachable_providers.is_empty() {
                "degraded"
            } else {
                "ok"
            },
            reachable_providers,
        }
    }

    /// Wait for queued cache and metric writes.
    pub async fn flush(&self) {
        if let Err(e) = self.cache.flush().await {
            warn!("Cache flush failed: {}", e);
        }
        if let Err(e) = self.metrics.flush().await {
            warn!("Metrics flush failed: {}", e);
        }
    }
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
