//! Scripted provider clients for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ragway_chat::{Completion, Provider, ProviderClient, ProviderError};
use ragway_core::ChatMessage;

pub(crate) struct MockClient {
    provider: Provider,
    reply: Result<String, ProviderError>,
    delay: Duration,
    calls: AtomicUsize,
    cancelled: AtomicUsize,
}

/// Counts a call as cancelled if its future is dropped before finishing.
struct InFlight<'a> {
    cancelled: &'a AtomicUsize,
    finished: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.cancelled.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl MockClient {
    pub(crate) fn replying(provider: Provider, text: &str) -> Arc<Self> {
        Arc::new(Self {
            provider,
            reply: Ok(text.to_string()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            cancelled: AtomicUsize::new(0),
        })
    }

    pub(crate) fn failing(provider: Provider, error: ProviderError) -> Arc<Self> {
        Arc::new(Self {
            provider,
            reply: Err(error),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            cancelled: AtomicUsize::new(0),
        })
    }

    pub(crate) fn slow(provider: Provider, text: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            provider,
            reply: Ok(text.to_string()),
            delay,
            calls: AtomicUsize::new(0),
            cancelled: AtomicUsize::new(0),
        })
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls whose future was dropped mid-flight.
    pub(crate) fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderClient for MockClient {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn send(
        &self,
        _model: &str,
        _messages: &[ChatMessage],
        _timeout: Duration,
    ) -> Result<Completion, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut in_flight = InFlight {
            cancelled: &self.cancelled,
            finished: false,
        };
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        in_flight.finished = true;
        self.reply.clone().map(|text| Completion {
            token_count: Some(text.len() as u64),
            text,
        })
    }
}
