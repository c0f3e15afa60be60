//! Append-only metrics log with rolling per-provider aggregates.
//!
//! `record` never waits on SQLite: events go onto a bounded queue and are
//! dropped with a warning when the queue is full or no database is attached.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::sqlite::SqliteStore;
use crate::types::{MetricEvent, MetricRecord, ProviderStats};
use crate::writer::BackgroundWriter;
use ragway_core::Result;

const HOUR_MS: i64 = 3_600_000;

pub struct MetricsCollector {
    store: Option<Arc<SqliteStore>>,
    writer: Option<BackgroundWriter<MetricEvent>>,
}

impl MetricsCollector {
    /// Start the background writer for `store`.
    pub fn open(store: Arc<SqliteStore>, queue_capacity: usize) -> Result<Self> {
        let writer = BackgroundWriter::spawn(
            "metrics",
            queue_capacity,
            store.clone(),
            |store: &SqliteStore, event: &MetricEvent| store.insert_metric(event).map(|_| ()),
        )?;
        info!("Metrics collector started (queue capacity {})", queue_capacity);
        Ok(Self {
            store: Some(store),
            writer: Some(writer),
        })
    }

    /// A collector with no durable backing; every record is dropped.
    pub fn disabled() -> Self {
        Self {
            store: None,
            writer: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.writer.is_some()
    }

    /// Append one record. Never blocks.
    pub fn record(&self, event: MetricEvent) {
        match &self.writer {
            Some(writer) => {
                writer.try_enqueue(event);
            }
            None => debug!(
                "Metrics disabled, dropping record for {}/{}",
                event.provider, event.model
            ),
        }
    }

    /// Per-provider aggregates over the trailing `window_hours`.
    pub fn aggregate(&self, window_hours: u64) -> Result<BTreeMap<String, ProviderStats>> {
        let Some(store) = &self.store else {
            return Ok(BTreeMap::new());
        };
        let window_ms = i64::try_from(window_hours)
            .unwrap_or(i64::MAX)
            .saturating_mul(HOUR_MS);
        let since = ragway_core::now_millis().saturating_sub(window_ms);
        store.aggregate_metrics(since)
    }

    /// Newest records first.
    pub fn recent(&self, limit: usize) -> Result<Vec<MetricRecord>> {
        match &self.store {
            Some(store) => store.recent_metrics(limit),
            None => Ok(Vec::new()),
        }
    }

    /// Wait until every record queued so far is written.
    pub async fn flush(&self) -> Result<()> {
        match &self.writer {
            Some(writer) => writer.flush().await,
            None => Ok(()),
        }
    }
}
