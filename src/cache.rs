use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, trace};

/// Identifies one cached backend read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Ideas,
    Idea(String),
    Comments(String),
    Replies(String),
    Votes(String),
    Reactions(String),
}

impl QueryKey {
    /// Idea the entry belongs to, when the key is scoped to one.
    pub fn idea_id(&self) -> Option<&str> {
        match self {
            QueryKey::Idea(id)
            | QueryKey::Comments(id)
            | QueryKey::Votes(id)
            | QueryKey::Reactions(id) => Some(id.as_str()),
            QueryKey::Ideas | QueryKey::Replies(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    stored_at: Instant,
}

#[derive(Debug, Default)]
struct Entries {
    map: HashMap<QueryKey, Entry>,
    /// Bumped by every invalidation so in-flight reads can tell they are stale.
    generation: u64,
}

impl Entries {
    fn remove(&mut self, key: &QueryKey) -> bool {
        self.generation += 1;
        self.map.remove(key).is_some()
    }
}

/// Read-through cache for query results; mutations invalidate the keys they
/// affect once they succeed. A zero TTL disables caching.
#[derive(Debug, Clone)]
pub struct QueryCache {
    entries: Arc<RwLock<Entries>>,
    ttl: Duration,
}

impl QueryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(Entries::default())),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Token for [`QueryCache::fill`]; take it before fetching.
    pub async fn generation(&self) -> u64 {
        self.entries.read().await.generation
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &QueryKey) -> Option<T> {
        if self.ttl.is_zero() {
            return None;
        }
        let stored_at = {
            let entries = self.entries.read().await;
            let entry = entries.map.get(key)?;
            if entry.stored_at.elapsed() < self.ttl {
                trace!(?key, "cache hit");
                return serde_json::from_value(entry.value.clone()).ok();
            }
            entry.stored_at
        };

        // Another task may have stored a fresh value since the read lock
        // was released.
        let mut entries = self.entries.write().await;
        if entries.map.get(key).is_some_and(|e| e.stored_at == stored_at) {
            entries.map.remove(key);
            trace!(?key, "cache entry expired");
        }
        None
    }

    pub async fn put<T: Serialize>(&self, key: QueryKey, value: &T) {
        if self.ttl.is_zero() {
            return;
        }
        let Some(value) = Self::encode(&key, value) else {
            return;
        };
        self.entries.write().await.map.insert(
            key,
            Entry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    /// Store a fetched value unless something was invalidated after
    /// `generation` was taken.
    pub async fn fill<T: Serialize>(&self, key: QueryKey, value: &T, generation: u64) {
        if self.ttl.is_zero() {
            return;
        }
        let Some(value) = Self::encode(&key, value) else {
            return;
        };
        let mut entries = self.entries.write().await;
        if entries.generation != generation {
            debug!(?key, "invalidated while fetching, not cached");
            return;
        }
        entries.map.insert(
            key,
            Entry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    fn encode<T: Serialize>(key: &QueryKey, value: &T) -> Option<Value> {
        match serde_json::to_value(value) {
            Ok(value) => Some(value),
            Err(err) => {
                debug!(?key, error = %err, "value not cacheable");
                None
            }
        }
    }

    pub async fn invalidate(&self, key: &QueryKey) {
        if self.entries.write().await.remove(key) {
            debug!(?key, "cache invalidated");
        }
    }

    pub async fn invalidate_all<'a, I>(&self, keys: I)
    where
        I: IntoIterator<Item = &'a QueryKey>,
    {
        let mut entries = self.entries.write().await;
        for key in keys {
            if entries.remove(key) {
                debug!(?key, "cache invalidated");
            }
        }
    }

    pub async fn invalidate_where<F>(&self, predicate: F)
    where
        F: Fn(&QueryKey) -> bool,
    {
        let mut entries = self.entries.write().await;
        entries.generation += 1;
        let before = entries.map.len();
        entries.map.retain(|key, _| !predicate(key));
        debug!(removed = before - entries.map.len(), "cache entries invalidated");
    }

    /// Drop every entry scoped to `idea_id`, plus the feed.
    pub async fn invalidate_idea(&self, idea_id: &str) {
        self.invalidate_where(|key| *key == QueryKey::Ideas || key.idea_id() == Some(idea_id))
            .await;
    }

    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        entries.generation += 1;
        entries.map.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.map.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}
