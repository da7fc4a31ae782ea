//! Error handling types and utilities.

use crate::types::RecordId;
use std::time::Duration;

/// A specialized Result type for glue code (configuration loading and the like).
///
/// This is an alias for `anyhow::Result` with context added via `.context()` and
/// `.with_context()` methods.
pub type Result<T> = anyhow::Result<T>;

/// Errors surfaced by [`SearchManager`](crate::SearchManager) operations.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The record store failed while the index was being (re)built.
    /// The previously published index keeps serving.
    #[error("index build failed: {0}")]
    IndexBuild(#[source] StoreError),

    /// The request was rejected before any index work was done.
    #[error("invalid search filter: {0}")]
    Validation(#[from] ValidationError),

    /// No record-store connection became available in time. Retryable.
    #[error("record store connection pool exhausted after {timeout:?}")]
    ResourceExhausted { timeout: Duration },

    /// The manager has been shut down and no longer hands out connections.
    #[error("search manager has been shut down")]
    ShutDown,

    /// A blocking build or query task panicked or was cancelled.
    #[error("search task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

/// A malformed [`SearchFilter`](crate::SearchFilter).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("min_messages ({min}) is greater than max_messages ({max})")]
    MessageBounds { min: usize, max: usize },

    #[error("date_start is after date_end")]
    DateRange,

    /// The filter field exists but this core has nothing to evaluate it against.
    #[error("filter '{0}' is not supported")]
    UnsupportedFilter(&'static str),
}

/// Error returned by a [`RecordStore`](crate::RecordStore) implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The backing store could not be read.
    #[error("record store unavailable: {0}")]
    Unavailable(String),

    /// A single record could not be decoded.
    #[error("record '{id}' is corrupt: {reason}")]
    Corrupt { id: RecordId, reason: String },
}

/// Reason the semantic capability cannot serve queries.
///
/// Never returned from a search; the query engine logs it and falls back to keyword mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SemanticIndexUnavailable {
    #[error("semantic search is disabled by configuration")]
    Disabled,

    #[error("no records to vectorize")]
    EmptyCorpus,

    #[error("no vocabulary terms survived pruning")]
    EmptyVocabulary,
}
