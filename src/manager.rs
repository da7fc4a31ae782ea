//! Public search façade: owns the published index, the result cache, and the store pool.
//!
//! Construct one [`SearchManager`] at start-up and share it (it is `Send + Sync`,
//! typically behind an `Arc`). Searches run concurrently. Rebuilds are
//! serialised against each other but never block searches, which keep using the
//! snapshot they started with until the new one is swapped in.

use crate::cache::{CacheKey, SearchCache};
use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::search::index::IndexSnapshot;
use crate::search::query::QueryEngine;
use crate::search::semantic::SemanticIndexer;
use crate::store::{RecordPool, RecordStore};
use crate::types::{IndexStats, SearchFilter, SearchResult};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};

pub struct SearchManager {
    /// Currently published snapshot; the lock is held only to clone or swap the `Arc`
    index: RwLock<Arc<IndexSnapshot>>,

    /// Serialises rebuilds
    rebuild_lock: Mutex<()>,

    cache: SearchCache,

    pool: RecordPool,

    indexer: Arc<dyn SemanticIndexer>,
}

impl std::fmt::Debug for SearchManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchManager")
            .field("cache", &self.cache)
            .field("pool", &self.pool)
            .field("indexer", &self.indexer)
            .finish_non_exhaustive()
    }
}

impl SearchManager {
    /// Creates a manager with an unbuilt index. Call [`rebuild_index`](Self::rebuild_index)
    /// before searching, or use [`open`](Self::open).
    pub fn new(store: Arc<dyn RecordStore>, config: &SearchConfig) -> Self {
        Self {
            index: RwLock::new(Arc::new(IndexSnapshot::empty())),
            rebuild_lock: Mutex::new(()),
            cache: SearchCache::new(config.cache_capacity),
            pool: RecordPool::new(store, config.pool_size, config.acquire_timeout()),
            indexer: config.indexer(),
        }
    }

    /// Creates a manager and builds its index.
    pub async fn open(
        store: Arc<dyn RecordStore>,
        config: &SearchConfig,
    ) -> Result<Self, SearchError> {
        let manager = Self::new(store, config);
        manager.rebuild_index().await?;
        Ok(manager)
    }

    /// Ranked results for `query`, at most `limit` of them.
    ///
    /// Identical requests are answered from the cache until the next rebuild or
    /// [`clear_cache`](Self::clear_cache). A request for semantic ranking silently
    /// uses keyword ranking when no vector space is available.
    pub async fn search(
        &self,
        query: &str,
        filter: &SearchFilter,
        limit: usize,
        semantic: bool,
    ) -> Result<Vec<SearchResult>, SearchError> {
        filter.validate()?;

        let key = CacheKey::new(query, filter, limit, semantic);
        match &key {
            Some(key) => {
                if let Some(hit) = self.cache.get(key).await {
                    tracing::debug!("Cache hit for {}", key);
                    return Ok(hit);
                }
                tracing::debug!("Cache miss for {}", key);
            }
            None => tracing::debug!("Bypassing cache for '{}'", query),
        }

        let snapshot = self.snapshot().await;
        let generation = snapshot.generation();
        let session = self.pool.acquire().await?;

        let query_owned = query.to_string();
        let filter_owned = filter.clone();
        let results = tokio::task::spawn_blocking(move || {
            QueryEngine::new(&snapshot, &*session, Utc::now()).run(
                &query_owned,
                &filter_owned,
                limit,
                semantic,
            )
        })
        .await?;

        if let Some(key) = key {
            self.cache.insert(key, generation, results.clone()).await;
        }
        Ok(results)
    }

    /// Re-reads the whole record store and publishes a fresh index.
    ///
    /// The cache is empty when this returns, whether or not the rebuild succeeded.
    /// On failure the previous index stays published and the error is returned.
    pub async fn rebuild_index(&self) -> Result<(), SearchError> {
        let _rebuilding = self.rebuild_lock.lock().await;

        let result = self.build_and_publish().await;
        if result.is_err() {
            // The old index keeps serving, so its generation stays current
            self.cache.clear().await;
        }
        result
    }

    /// Builds the next generation and swaps it in. Caller holds `rebuild_lock`.
    async fn build_and_publish(&self) -> Result<(), SearchError> {
        let next_generation = self.snapshot().await.generation() + 1;
        let session = self.pool.acquire().await?;
        let indexer = Arc::clone(&self.indexer);

        tracing::info!("Building search index (generation {})", next_generation);
        let start = Instant::now();

        let built = tokio::task::spawn_blocking(move || {
            IndexSnapshot::build(&*session, &*indexer, next_generation)
        })
        .await?;

        let snapshot = match built {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(
                    "Index build failed, keeping generation {}: {}",
                    next_generation - 1,
                    e
                );
                return Err(SearchError::IndexBuild(e));
            }
        };

        let stats = snapshot.stats();
        *self.index.write().await = Arc::new(snapshot);
        // Only after the swap, so no pre-rebuild result can be cached afterwards
        self.cache.invalidate(next_generation).await;

        tracing::info!(
            "Search index built in {:?}: {} records, {} terms, {} tags, semantic: {}",
            start.elapsed(),
            stats.indexed_records,
            stats.indexed_words,
            stats.indexed_tags,
            stats.semantic_index_built
        );
        Ok(())
    }

    pub async fn get_stats(&self) -> IndexStats {
        self.snapshot().await.stats()
    }

    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    /// Flushes the cache and closes the store pool. Later searches and rebuilds
    /// fail with [`SearchError::ShutDown`] unless answered from the (empty) cache.
    pub async fn shutdown(&self) {
        self.cache.clear().await;
        self.pool.close();
        tracing::info!("Search manager shut down");
    }

    async fn snapshot(&self) -> Arc<IndexSnapshot> {
        Arc::clone(&*self.index.read().await)
    }
}
