//! Concurrent provider dispatch with per-call timeouts.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use ragway_chat::{Completion, Provider, ProviderClient, ProviderError, ResolvedTarget};
use ragway_core::ChatMessage;
use tracing::{debug, error};

/// Result of one provider call.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub target: ResolvedTarget,
    pub result: Result<Completion, ProviderError>,
    pub latency: Duration,
}

pub struct Dispatcher {
    clients: HashMap<Provider, Arc<dyn ProviderClient>>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(clients: HashMap<Provider, Arc<dyn ProviderClient>>, timeout: Duration) -> Self {
        Self { clients, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Call one provider. The timeout covers the whole call; elapsing it
    /// yields [`ProviderError::Timeout`].
    pub async fn dispatch_one(&self, target: &ResolvedTarget, messages: &[ChatMessage]) -> DispatchOutcome {
        let start = Instant::now();

        let result = match self.clients.get(&target.provider) {
            Some(client) => {
                match tokio::time::timeout(self.timeout, client.send(&target.model, messages, self.timeout)).await {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout),
                }
            }
            None => Err(ProviderError::Unknown {
                code: None,
                message: format!("no client registered for {}", target.provider),
            }),
        };
        let latency = start.elapsed();

        match &result {
            Ok(_) => debug!("{} answered in {:?}", target, latency),
            Err(e) => error!("{} failed after {:?}: {}", target, latency, e),
        }

        DispatchOutcome {
            target: target.clone(),
            result,
            latency,
        }
    }

    /// Call every target concurrently and wait for all of them.
    ///
    /// Outcomes come back in `targets` order. Dropping the returned future
    /// cancels every call still in flight.
    pub async fn dispatch_many(
        &self,
        targets: &[ResolvedTarget],
        messages: &[ChatMessage],
    ) -> Vec<DispatchOutcome> {
        join_all(targets.iter().map(|t| self.dispatch_one(t, messages))).await
    }
}
