//! Bounded query-result cache.
//!
//! Entries are evicted oldest-inserted first. Lookups use [`LruCache::peek`], which
//! does not refresh recency, so the LRU order is exactly insertion order.
//!
//! Every entry belongs to an index generation. [`SearchCache::invalidate`] moves
//! the cache to a new generation and drops everything; results computed against
//! an older snapshot are refused on insert, so a search that raced a rebuild
//! cannot repopulate the cache with stale results.

use crate::types::{SearchFilter, SearchResult};
use lru::LruCache;
use std::fmt;
use std::num::NonZeroUsize;
use tokio::sync::RwLock;

/// Canonical identity of a search request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Builds the key from the lower-cased query, the set filter fields, the limit, and the mode.
    ///
    /// Returns `None` if the filter cannot be serialized; the caller then bypasses the cache.
    pub fn new(query: &str, filter: &SearchFilter, limit: usize, semantic: bool) -> Option<Self> {
        let filter = serde_json::to_string(&filter.normalized()).ok()?;
        let mode = if semantic { "semantic" } else { "keyword" };
        Some(Self(format!(
            "{}\u{1f}{}\u{1f}{}\u{1f}{}",
            query.trim().to_lowercase(),
            filter,
            limit,
            mode
        )))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.replace('\u{1f}', "|"))
    }
}

struct CacheState {
    /// `None` when caching is disabled (capacity 0)
    entries: Option<LruCache<CacheKey, Vec<SearchResult>>>,
    generation: u64,
}

/// Query-result cache with its own lock, independent of the index.
pub struct SearchCache {
    state: RwLock<CacheState>,
}

impl fmt::Debug for SearchCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state.try_read() {
            Ok(state) => f
                .debug_struct("SearchCache")
                .field("len", &state.entries.as_ref().map_or(0, LruCache::len))
                .field("generation", &state.generation)
                .finish(),
            Err(_) => f.debug_struct("SearchCache").finish_non_exhaustive(),
        }
    }
}

impl SearchCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: RwLock::new(CacheState {
                entries: NonZeroUsize::new(capacity).map(LruCache::new),
                generation: 0,
            }),
        }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<Vec<SearchResult>> {
        let state = self.state.read().await;
        state.entries.as_ref()?.peek(key).cloned()
    }

    /// Stores `results` computed against index `generation`.
    ///
    /// Returns `false` if the entry was refused because the cache has moved on to a
    /// newer generation (or caching is disabled).
    pub async fn insert(&self, key: CacheKey, generation: u64, results: Vec<SearchResult>) -> bool {
        let mut state = self.state.write().await;
        if generation != state.generation {
            tracing::debug!(
                "Not caching results from generation {} (cache is at {})",
                generation,
                state.generation
            );
            return false;
        }
        let Some(entries) = state.entries.as_mut() else {
            return false;
        };
        // Replacing keeps the entry's place in the eviction order
        if let Some(existing) = entries.peek_mut(&key) {
            *existing = results;
            return true;
        }
        if let Some((evicted, _)) = entries.push(key, results) {
            tracing::trace!("Evicted cached query {}", evicted);
        }
        true
    }

    /// Drops every entry, keeping the current generation.
    pub async fn clear(&self) {
        if let Some(entries) = self.state.write().await.entries.as_mut() {
            entries.clear();
        }
    }

    /// Drops every entry and only accepts results from `generation` onwards.
    pub async fn invalidate(&self, generation: u64) {
        let mut state = self.state.write().await;
        state.generation = state.generation.max(generation);
        if let Some(entries) = state.entries.as_mut() {
            entries.clear();
        }
    }

    pub async fn len(&self) -> usize {
        self.state
            .read()
            .await
            .entries
            .as_ref()
            .map_or(0, LruCache::len)
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
