//! SQLite persistence for cache rows and metric records.
//!
//! One connection guarded by a mutex. Callers on the request path never take
//! this lock: the background writers and out-of-band reads (aggregation,
//! pruning, load on open) are the only users.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{params, Connection};
use tracing::info;

use crate::schema::{CACHE_SCHEMA_SQL, METRICS_SCHEMA_SQL};
use crate::types::*;
use ragway_core::{Error, Result};

pub const DB_FILE_NAME: &str = "gateway.db";

/// SQLite store backing the response cache and the metrics log.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteStore {
    /// Open or create the SQLite store.
    ///
    /// `db_dir` is the directory (e.g., `data/db/`). The file will be `db_dir/gateway.db`.
    pub fn open(db_dir: impl AsRef<Path>) -> Result<Self> {
        let db_dir = db_dir.as_ref();
        std::fs::create_dir_all(db_dir).map_err(|e| Error::Storage(e.to_string()))?;
        let db_path = db_dir.join(DB_FILE_NAME);

        let conn = Self::create_connection(&db_path)?;
        Self::init_schema(&conn)?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path,
        };

        info!(
            "SqliteStore initialized: {} cache entries, {} metric records, path={}",
            store.count_cache_entries()?,
            store.count_metrics()?,
            store.db_path.display()
        );

        Ok(store)
    }

    fn create_connection(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open(db_path).map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(conn)
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        let full_schema = format!("{}\n{}", CACHE_SCHEMA_SQL, METRICS_SCHEMA_SQL);
        conn.execute_batch(&full_schema)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    // ---------------------------------------------------------------
    // Response cache
    // ---------------------------------------------------------------

    /// Insert or replace the row for a cache key.
    pub fn upsert_cache_entry(&self, entry: &StoredCacheEntry) -> Result<()> {
        let conn = self.conn.lock();
        conn.prepare_cached(
            "INSERT OR REPLACE INTO response_cache (cache_key, response, provider, model, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .map_err(|e| Error::Database(e.to_string()))?
        .execute(params![
            entry.cache_key,
            entry.response,
            entry.provider,
            entry.model,
            entry.created_at,
        ])
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    /// Get a cache row by key, regardless of age.
    #[cfg(test)]
    pub(crate) fn get_cache_entry(&self, cache_key: &str) -> Result<Option<StoredCacheEntry>> {
        use rusqlite::OptionalExtension;

        let conn = self.conn.lock();
        let row = conn
            .prepare_cached("SELECT * FROM response_cache WHERE cache_key = ?1")
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![cache_key], |row| Ok(Self::row_to_cache_entry(row)))
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(row)
    }

    /// Load every cache row (used to warm the in-memory tier on open).
    pub fn load_cache_entries(&self) -> Result<Vec<StoredCacheEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT * FROM response_cache")
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| Ok(Self::row_to_cache_entry(row)))
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Delete rows created strictly before `cutoff_ms`. Returns rows deleted.
    pub fn delete_cache_entries_before(&self, cutoff_ms: i64) -> Result<usize> {
        let conn = self.conn.lock();
        let count = conn
            .execute(
                "DELETE FROM response_cache WHERE created_at < ?1",
                params![cutoff_ms],
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(count)
    }

    pub fn count_cache_entries(&self) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row("SELECT COUNT(*) FROM response_cache", [], |row| row.get(0))
            .map_err(|e| Error::Database(e.to_string()))
    }

    // ---------------------------------------------------------------
    // Metrics
    // ---------------------------------------------------------------

    /// Append a metric record. Returns its id.
    pub fn insert_metric(&self, event: &MetricEvent) -> Result<i64> {
        let meta_json = event
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let token_count = event.token_count.map(|t| t as i64);

        let conn = self.conn.lock();
        let id = conn
            .prepare_cached(
                "INSERT INTO metrics (timestamp, provider, model, latency_ms, token_count, \
                 success, source, metadata_json) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )
            .map_err(|e| Error::Database(e.to_string()))?
            .insert(params![
                event.timestamp,
                event.provider,
                event.model,
                event.latency_ms,
                token_count,
                event.success,
                event.source.as_str(),
                meta_json,
            ])
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(id)
    }

    /// Per-provider aggregates over records with `timestamp >= since_ms`.
    pub fn aggregate_metrics(&self, since_ms: i64) -> Result<BTreeMap<String, ProviderStats>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT provider, COUNT(*), AVG(latency_ms), \
                 SUM(CASE WHEN success THEN 1 ELSE 0 END), \
                 SUM(CASE WHEN source = 'cache' THEN 1 ELSE 0 END) \
                 FROM metrics WHERE timestamp >= ?1 GROUP BY provider",
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![since_ms], |row| {
                let provider: String = row.get(0)?;
                let requests: i64 = row.get(1)?;
                let avg_latency: Option<f64> = row.get(2)?;
                let successes: Option<i64> = row.get(3)?;
                let cache_hits: Option<i64> = row.get(4)?;
                Ok((
                    provider,
                    ProviderStats::from_counts(
                        requests.max(0) as u64,
                        avg_latency.unwrap_or(0.0),
                        successes.unwrap_or(0).max(0) as u64,
                        cache_hits.unwrap_or(0).max(0) as u64,
                    ),
                ))
            })
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut stats = BTreeMap::new();
        for row in rows {
            let (provider, provider_stats) = row.map_err(|e| Error::Database(e.to_string()))?;
            stats.insert(provider, provider_stats);
        }
        Ok(stats)
    }

    /// Newest records first.
    pub fn recent_metrics(&self, limit: usize) -> Result<Vec<MetricRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT * FROM metrics ORDER BY id DESC LIMIT ?1")
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![limit as i64], |row| Ok(Self::row_to_metric(row)))
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn count_metrics(&self) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row("SELECT COUNT(*) FROM metrics", [], |row| row.get(0))
            .map_err(|e| Error::Database(e.to_string()))
    }

    // ---------------------------------------------------------------
    // Row Mapping Helpers
    // ---------------------------------------------------------------

    fn row_to_cache_entry(row: &rusqlite::Row<'_>) -> StoredCacheEntry {
        StoredCacheEntry {
            cache_key: row.get("cache_key").unwrap_or_default(),
            response: row.get("response").unwrap_or_default(),
            provider: row.get("provider").unwrap_or_default(),
            model: row.get("model").unwrap_or_default(),
            created_at: row.get("created_at").unwrap_or(0),
        }
    }

    fn row_to_metric(row: &rusqlite::Row<'_>) -> MetricRecord {
        MetricRecord {
            id: row.get("id").unwrap_or(0),
            event: MetricEvent {
                timestamp: row.get("timestamp").unwrap_or(0),
                provider: row.get("provider").unwrap_or_default(),
                model: row.get("model").unwrap_or_default(),
                latency_ms: row.get("latency_ms").unwrap_or(0.0),
                success: row.get("success").unwrap_or(false),
                source: MetricSource::parse(
                    &row.get::<_, String>("source").unwrap_or_default(),
                ),
                token_count: row
                    .get::<_, Option<i64>>("token_count")
                    .ok()
                    .flatten()
                    .map(|t| t.max(0) as u64),
                metadata: row
                    .get::<_, Option<String>>("metadata_json")
                    .ok()
                    .flatten()
                    .and_then(|s| serde_json::from_str(&s).ok()),
            },
        }
    }
}
