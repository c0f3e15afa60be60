//! Database schema SQL.

/// Response cache: one row per content fingerprint, replaced on overwrite.
pub const CACHE_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS response_cache (
    cache_key TEXT PRIMARY KEY,
    response TEXT NOT NULL,
    provider TEXT NOT NULL,
    model TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_response_cache_created ON response_cache(created_at);
"#;

/// Metrics log: append-only, ordered by autoincrement id.
pub const METRICS_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS metrics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp INTEGER NOT NULL,
    event_type TEXT NOT NULL DEFAULT 'llm_request',
    provider TEXT NOT NULL,
    model TEXT NOT NULL,
    latency_ms REAL NOT NULL,
    token_count INTEGER,
    success INTEGER NOT NULL,
    source TEXT NOT NULL DEFAULT 'live',
    metadata_json TEXT
);

CREATE INDEX IF NOT EXISTS idx_metrics_timestamp ON metrics(timestamp);
CREATE INDEX IF NOT EXISTS idx_metrics_provider ON metrics(provider);
"#;
