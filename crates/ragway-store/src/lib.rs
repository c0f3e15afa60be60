//! Ragway Store — content-addressed response cache and append-only metrics log.
//!
//! Both are backed by a single SQLite database (`gateway.db`). Serving-path
//! operations never touch SQLite directly: cache reads hit an in-memory
//! sharded map and all writes go through bounded background queues.

pub mod cache;
pub mod fingerprint;
pub mod metrics;
pub mod schema;
pub mod sqlite;
pub mod types;
mod writer;

pub use cache::{CacheEntry, ResponseCache};
pub use fingerprint::CacheKey;
pub use metrics::MetricsCollector;
pub use sqlite::SqliteStore;
pub use types::*;
