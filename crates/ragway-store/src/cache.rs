//! Content-addressed LLM response cache with age-based staleness.
//!
//! Reads and writes hit a sharded in-memory map, so unrelated keys never
//! contend. When a database is attached, every `set` is persisted
//! write-behind and fresh rows are loaded into the map on open. Stale
//! entries are treated as misses until a prune pass removes them.

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::fingerprint::CacheKey;
use crate::sqlite::SqliteStore;
use crate::types::StoredCacheEntry;
use crate::writer::BackgroundWriter;
use ragway_core::{ChatMessage, Result};

/// Cached response with its creation time.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub response: String,
    pub created_at: DateTime<Utc>,
    pub provider: String,
    pub model: String,
}

impl CacheEntry {
    /// Whether the entry is younger than `max_age`.
    ///
    /// A `max_age` too large for chrono to represent never expires.
    pub fn is_fresh(&self, max_age: Duration) -> bool {
        let age = Utc::now().signed_duration_since(self.created_at);
        match chrono::Duration::from_std(max_age) {
            Ok(max_age) => age < max_age,
            Err(_) => true,
        }
    }
}

/// Thread-safe response cache.
pub struct ResponseCache {
    entries: DashMap<CacheKey, CacheEntry>,
    store: Option<Arc<SqliteStore>>,
    writer: Option<BackgroundWriter<StoredCacheEntry>>,
}

impl ResponseCache {
    /// A cache with no durable backing.
    pub fn in_memory() -> Self {
        Self {
            entries: DashMap::new(),
            store: None,
            writer: None,
        }
    }

    /// Attach to a store: load rows younger than `max_age` and start the
    /// persistence writer. Stale rows and rows with an unreadable timestamp
    /// stay on disk until the next prune.
    pub fn open(store: Arc<SqliteStore>, queue_capacity: usize, max_age: Duration) -> Result<Self> {
        let entries = DashMap::new();
        let mut skipped = 0usize;
        for row in store.load_cache_entries()? {
            let Some(created_at) = Utc.timestamp_millis_opt(row.created_at).single() else {
                warn!("Skipping cache row {} with invalid created_at {}", row.cache_key, row.created_at);
                skipped += 1;
                continue;
            };
            let entry = CacheEntry {
                response: row.response,
                created_at,
                provider: row.provider,
                model: row.model,
            };
            if !entry.is_fresh(max_age) {
                skipped += 1;
                continue;
            }
            entries.insert(CacheKey::from_stored(row.cache_key), entry);
        }
        info!(
            "Response cache loaded {} entries ({} stale or unreadable skipped)",
            entries.len(),
            skipped
        );

        let writer = BackgroundWriter::spawn(
            "cache",
            queue_capacity,
            store.clone(),
            |store: &SqliteStore, row: &StoredCacheEntry| store.upsert_cache_entry(row),
        )?;

        Ok(Self {
            entries,
            store: Some(store),
            writer: Some(writer),
        })
    }

    /// Look up a response. Misses on absent or stale entries.
    pub fn get(
        &self,
        provider: &str,
        model: &str,
        messages: &[ChatMessage],
        max_age: Duration,
    ) -> Option<String> {
        let key = CacheKey::new(provider, model, messages);
        let entry = self.entries.get(&key)?;
        if entry.is_fresh(max_age) {
            debug!("Cache hit for {}/{} ({})", provider, model, key);
            Some(entry.response.clone())
        } else {
            debug!("Cache entry stale for {}/{} ({})", provider, model, key);
            None
        }
    }

    /// Store a response, replacing any existing entry for the same key.
    ///
    /// The disk write is queued while the key's shard is locked, so the
    /// writer sees racing `set`s in the same order the map applies them.
    pub fn set(&self, provider: &str, model: &str, messages: &[ChatMessage], response: &str) {
        let key = CacheKey::new(provider, model, messages);
        let stored_key = key.as_str().to_string();

        let slot = self.entries.entry(key);
        let entry = CacheEntry {
            response: response.to_string(),
            created_at: Utc::now(),
            provider: provider.to_string(),
            model: model.to_string(),
        };

        if let Some(writer) = &self.writer {
            writer.try_enqueue(StoredCacheEntry {
                cache_key: stored_key,
                response: entry.response.clone(),
                provider: entry.provider.clone(),
                model: entry.model.clone(),
                created_at: entry.created_at.timestamp_millis(),
            });
        }

        slot.insert(entry);
    }

    /// Remove entries older than `max_age` from memory and disk.
    ///
    /// Returns the number of rows deleted from disk, or the number of
    /// in-memory entries removed when the cache has no store.
    pub fn prune(&self, max_age: Duration) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_fresh(max_age));
        let mut removed = before.saturating_sub(self.entries.len());

        if let (Some(store), Ok(max_age)) = (&self.store, chrono::Duration::from_std(max_age)) {
            let cutoff = (Utc::now() - max_age).timestamp_millis();
            match store.delete_cache_entries_before(cutoff) {
                Ok(deleted) => {
                    debug!("Pruned {} cache rows from disk", deleted);
                    removed = deleted;
                }
                Err(e) => warn!("Cache prune on disk failed: {}", e),
            }
        }

        if removed > 0 {
            info!("Pruned {} stale cache entries", removed);
        }
        removed
    }

    /// Run `prune(max_age)` every `every` on the tokio runtime.
    ///
    /// The task holds only a weak reference and stops once the cache is dropped.
    pub fn spawn_pruner(self: &Arc<Self>, max_age: Duration, every: Duration) -> JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);
        let every = every.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    debug!("Response cache dropped, pruner exiting");
                    break;
                };
                if let Err(e) = tokio::task::spawn_blocking(move || cache.prune(max_age)).await {
                    warn!("Cache prune task failed: {}", e);
                }
            }
        })
    }

    /// Wait for queued writes to reach the database. No-op when memory-only.
    pub async fn flush(&self) -> Result<()> {
        match &self.writer {
            Some(writer) => writer.flush().await,
            None => Ok(()),
        }
    }

    pub fn is_persistent(&self) -> bool {
        self.store.is_some()
    }

    /// Number of entries in the cache, stale ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const FOREVER: Duration = Duration::MAX;

    fn msgs(text: &str) -> Vec<ChatMessage> {
        vec![ChatMessage::system("ctx"), ChatMessage::user(text)]
    }

    #[test]
    fn test_cache_hit_and_miss() {
        let cache = ResponseCache::in_memory();
        assert!(cache.get("openai", "gpt-4o", &msgs("hello"), FOREVER).is_none());

        cache.set("openai", "gpt-4o", &msgs("hello"), "hi there");
        assert_eq!(
            cache.get("openai", "gpt-4o", &msgs("hello"), FOREVER).as_deref(),
            Some("hi there")
        );
        assert!(cache.get("openai", "gpt-4", &msgs("hello"), FOREVER).is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_round_trip_empty_and_unicode() {
        let cache = ResponseCache::in_memory();

        cache.set("gemini", "gemini-pro", &[], "");
        assert_eq!(cache.get("gemini", "gemini-pro", &[], FOREVER).as_deref(), Some(""));

        let unicode = vec![ChatMessage::user("Olá, mundo! 日本語 🚀")];
        cache.set("deepseek", "deepseek-chat", &unicode, "Resposta: ção ✓");
        assert_eq!(
            cache.get("deepseek", "deepseek-chat", &unicode, FOREVER).as_deref(),
            Some("Resposta: ção ✓")
        );
    }

    #[test]
    fn test_overwrite_last_write_wins() {
        let cache = ResponseCache::in_memory();
        cache.set("openai", "gpt-4o", &msgs("q"), "first");
        cache.set("openai", "gpt-4o", &msgs("q"), "second");
        assert_eq!(cache.get("openai", "gpt-4o", &msgs("q"), FOREVER).as_deref(), Some("second"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_ttl_expiry() {
        let cache = ResponseCache::in_memory();
        cache.set("openai", "gpt-4o", &msgs("q"), "answer");

        // now - T >= 0 always, so a zero max age never hits
        assert!(cache.get("openai", "gpt-4o", &msgs("q"), Duration::ZERO).is_none());
        assert!(cache
            .get("openai", "gpt-4o", &msgs("q"), Duration::from_secs(3600))
            .is_some());

        std::thread::sleep(Duration::from_millis(20));
        assert!(cache
            .get("openai", "gpt-4o", &msgs("q"), Duration::from_millis(10))
            .is_none());
        // Stale reads don't purge.
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_prune_removes_only_stale() {
        let cache = ResponseCache::in_memory();
        cache.set("openai", "gpt-4o", &msgs("old"), "a");
        std::thread::sleep(Duration::from_millis(30));
        cache.set("openai", "gpt-4o", &msgs("new"), "b");

        assert_eq!(cache.prune(Duration::from_millis(15)), 1);
        assert!(cache.get("openai", "gpt-4o", &msgs("old"), FOREVER).is_none());
        assert!(cache.get("openai", "gpt-4o", &msgs("new"), FOREVER).is_some());
    }

    #[test]
    fn test_concurrent_writers_same_and_different_keys() {
        let cache = Arc::new(ResponseCache::in_memory());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for j in 0..50 {
                        cache.set("openai", "gpt-4o", &msgs("shared"), &format!("{}-{}", i, j));
                        cache.set("openai", "gpt-4o", &msgs(&format!("own-{}", i)), "mine");
                        let _ = cache.get("openai", "gpt-4o", &msgs("shared"), FOREVER);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(cache.len(), 9);
        let shared = cache.get("openai", "gpt-4o", &msgs("shared"), FOREVER).unwrap();
        assert!(shared.ends_with("-49"));
    }

    #[tokio::test]
    async fn test_persisted_entries_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = Arc::new(SqliteStore::open(dir.path()).unwrap());
            let cache = ResponseCache::open(store, 16, FOREVER).unwrap();
            assert!(cache.is_persistent());
            cache.set("openrouter", "anthropic/claude-3-haiku", &msgs("persist"), "durable");
            cache.flush().await.unwrap();
        }

        let store = Arc::new(SqliteStore::open(dir.path()).unwrap());
        let cache = ResponseCache::open(store, 16, FOREVER).unwrap();
        assert_eq!(
            cache
                .get("openrouter", "anthropic/claude-3-haiku", &msgs("persist"), FOREVER)
                .as_deref(),
            Some("durable")
        );
    }

    #[tokio::test]
    async fn test_prune_deletes_rows_on_disk() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SqliteStore::open(dir.path()).unwrap());
        let cache = ResponseCache::open(store.clone(), 16, FOREVER).unwrap();

        cache.set("openai", "gpt-4o", &msgs("gone"), "x");
        cache.flush().await.unwrap();
        assert_eq!(store.count_cache_entries().unwrap(), 1);

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.prune(Duration::from_millis(5)), 1);
        assert_eq!(store.count_cache_entries().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_racing_sets_agree_across_tiers() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SqliteStore::open(dir.path()).unwrap());
        let cache = Arc::new(ResponseCache::open(store.clone(), 4096, FOREVER).unwrap());
        let key = CacheKey::new("openai", "gpt-4o", &msgs("race"));

        for round in 0..25 {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let cache = cache.clone();
                    std::thread::spawn(move || {
                        for j in 0..10 {
                            let value = format!("{}-{}-{}", round, i, j);
                            cache.set("openai", "gpt-4o", &msgs("race"), &value);
                        }
                    })
                })
                .collect();
            for h in handles {
                h.join().unwrap();
            }
            cache.flush().await.unwrap();

            let in_memory = cache.get("openai", "gpt-4o", &msgs("race"), FOREVER).unwrap();
            let on_disk = store.get_cache_entry(key.as_str()).unwrap().unwrap();
            assert_eq!(in_memory, on_disk.response, "tiers diverged in round {}", round);
        }
    }

    #[tokio::test]
    async fn test_open_skips_stale_and_unreadable_rows() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SqliteStore::open(dir.path()).unwrap());
        let fresh_key = CacheKey::new("openai", "gpt-4o", &msgs("fresh"));
        let now = Utc::now().timestamp_millis();
        for (cache_key, created_at) in [
            ("stale".to_string(), 0),
            ("corrupt".to_string(), i64::MAX),
            (fresh_key.as_str().to_string(), now),
        ] {
            store
                .upsert_cache_entry(&StoredCacheEntry {
                    cache_key,
                    response: "r".into(),
                    provider: "openai".into(),
                    model: "gpt-4o".into(),
                    created_at,
                })
                .unwrap();
        }

        let cache = ResponseCache::open(store.clone(), 16, Duration::from_secs(3600)).unwrap();
        assert_eq!(cache.len(), 1);
        assert!(cache.get("openai", "gpt-4o", &msgs("fresh"), FOREVER).is_some());

        assert_eq!(cache.prune(Duration::from_secs(3600)), 1);
        assert!(store.get_cache_entry("stale").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_pruner_evicts_stale_entries_and_stops_on_drop() {
        let cache = Arc::new(ResponseCache::in_memory());
        cache.set("gemini", "gemini-pro", &msgs("short-lived"), "x");

        let handle = cache.spawn_pruner(Duration::from_millis(20), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(cache.is_empty());

        drop(cache);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("pruner should exit once the cache is dropped")
            .unwrap();
    }
}
