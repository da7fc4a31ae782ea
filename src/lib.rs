//! Search and retrieval over a personal archive of conversations.
//!
//! ```ignore
//! let store = Arc::new(MemoryRecordStore::from_json(&archive_json)?);
//! let manager = SearchManager::open(store, &SearchConfig::load_or_default(None)?).await?;
//! let hits = manager.search("anxiety", &SearchFilter::new().tags(["work"]), 10, false).await?;
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod manager;
pub mod search;
pub mod store;
pub mod tracing;
pub mod types;

pub use cache::{CacheKey, SearchCache};
pub use config::{SearchConfig, SemanticConfig};
pub use error::{SearchError, SemanticIndexUnavailable, StoreError, ValidationError};
pub use manager::SearchManager;
pub use search::{DisabledIndexer, SemanticIndexer, TfIdfIndex, TfIdfIndexer, tokenize};
pub use store::{Message, MemoryRecordStore, PooledStore, Record, RecordIter, RecordPool, RecordStore};
pub use types::{IndexStats, RecordId, SearchFilter, SearchResult};
