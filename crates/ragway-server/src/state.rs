//! Shared application state.

use std::sync::Arc;

use ragway_chat::{build_clients, LLMConfig, ProviderRegistry};
use ragway_core::GatewayConfig;
use ragway_runtime::{Dispatcher, Gateway};
use ragway_store::{MetricsCollector, ResponseCache, SqliteStore};
use tracing::{info, warn};

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: GatewayConfig,
    pub gateway: Gateway,
}

impl AppState {
    /// Wire the gateway from process configuration and stored LLM settings.
    pub fn new(config: GatewayConfig, llm_config: &LLMConfig) -> Self {
        let registry = Arc::new(ProviderRegistry::from_config(llm_config));
        let clients = build_clients(llm_config, &registry);
        let (cache, metrics) = open_storage(&config);
        start_cache_pruner(&cache, &config);

        let gateway = Gateway::new(
            registry,
            Dispatcher::new(clients, config.provider_timeout()),
            cache,
            metrics,
            config.cache_max_age(),
        );
        Self { config, gateway }
    }

    pub fn with_gateway(config: GatewayConfig, gateway: Gateway) -> Self {
        Self { config, gateway }
    }
}

/// Open the cache and metrics store. Failures degrade to a memory-only cache
/// and disabled metrics instead of aborting startup.
pub fn open_storage(config: &GatewayConfig) -> (Arc<ResponseCache>, Arc<MetricsCollector>) {
    let store = match SqliteStore::open(&config.data_paths.db_dir) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!("Gateway database unavailable, running without persistence: {}", e);
            return (
                Arc::new(ResponseCache::in_memory()),
                Arc::new(MetricsCollector::disabled()),
            );
        }
    };
    info!("Gateway database: {}", store.db_path().display());

    let cache = ResponseCache::open(
        store.clone(),
        config.cache_queue_capacity,
        config.cache_max_age(),
    )
    .unwrap_or_else(|e| {
        warn!("Response cache falling back to memory-only: {}", e);
        ResponseCache::in_memory()
    });
    let metrics = MetricsCollector::open(store, config.metrics_queue_capacity).unwrap_or_else(|e| {
        warn!("Metrics disabled: {}", e);
        MetricsCollector::disabled()
    });

    (Arc::new(cache), Arc::new(metrics))
}

/// Periodically evict stale cache entries. Needs a running tokio runtime;
/// without one the cache is only pruned by `ragway prune`.
fn start_cache_pruner(cache: &Arc<ResponseCache>, config: &GatewayConfig) {
    if tokio::runtime::Handle::try_current().is_err() {
        warn!("No tokio runtime, background cache pruning disabled");
        return;
    }
    cache.spawn_pruner(config.cache_max_age(), config.cache_prune_interval());
    info!(
        "Cache pruning every {:?} (max age {:?})",
        config.cache_prune_interval(),
        config.cache_max_age()
    );
}
