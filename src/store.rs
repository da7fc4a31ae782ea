//! Record-store collaborator interface and a bounded connection pool over it.
//!
//! The search core never owns records. It reads them through [`RecordStore`]
//! while building the index and while filtering or scoring candidates. Every read
//! goes through a [`PooledStore`] handed out by [`RecordPool`], so the number of
//! concurrent store sessions stays bounded.

use crate::error::{Result, SearchError, StoreError};
use crate::types::RecordId;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Deref;
use std::sync::{Arc, OnceLock, RwLock};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// One message inside a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

/// An archived conversation as supplied by the record store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    id: RecordId,
    #[serde(default)]
    title: String,
    #[serde(default)]
    auto_title: Option<String>,
    #[serde(default)]
    tags: BTreeSet<String>,
    #[serde(default)]
    summary: Option<String>,
    create_time: DateTime<Utc>,
    #[serde(default)]
    messages: Vec<Message>,
    /// Concatenated searchable body, built on first use
    #[serde(skip)]
    body: OnceLock<String>,
}

impl Record {
    pub fn new(id: impl Into<RecordId>, title: impl Into<String>, create_time: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            auto_title: None,
            tags: BTreeSet::new(),
            summary: None,
            create_time,
            messages: Vec::new(),
            body: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn with_auto_title(mut self, auto_title: impl Into<String>) -> Self {
        self.auto_title = Some(auto_title.into());
        self.body = OnceLock::new();
        self
    }

    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self.body = OnceLock::new();
        self
    }

    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self.body = OnceLock::new();
        self
    }

    #[must_use]
    pub fn with_message(mut self, role: impl Into<String>, content: impl Into<String>) -> Self {
        self.messages.push(Message {
            role: role.into(),
            content: content.into(),
        });
        self.body = OnceLock::new();
        self
    }

    pub const fn id(&self) -> &RecordId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn auto_title(&self) -> Option<&str> {
        self.auto_title.as_deref()
    }

    pub const fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub const fn create_time(&self) -> DateTime<Utc> {
        self.create_time
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Title, auto title, tags, summary, and message content joined with newlines.
    ///
    /// Highlight spans in search results are byte offsets into this string.
    pub fn full_text(&self) -> &str {
        self.body.get_or_init(|| {
            let mut parts: Vec<&str> = vec![self.title.as_str()];
            parts.extend(self.auto_title.as_deref());
            parts.extend(self.tags.iter().map(String::as_str));
            parts.extend(self.summary.as_deref());
            parts.extend(self.messages.iter().map(|m| m.content.as_str()));
            parts.retain(|p| !p.is_empty());
            parts.join("\n")
        })
    }
}

/// Iterator over every record in a store. An `Err` item aborts an index build.
pub type RecordIter<'a> = Box<dyn Iterator<Item = std::result::Result<Record, StoreError>> + 'a>;

/// Source of archived records.
///
/// Implementations are externally synchronized: the search core may call them
/// from several blocking tasks at once. Lookups of a record that no longer
/// exists return `Ok(None)`.
pub trait RecordStore: Send + Sync {
    fn list_records(&self) -> std::result::Result<RecordIter<'_>, StoreError>;

    fn get_record(&self, id: &RecordId) -> std::result::Result<Option<Record>, StoreError>;

    fn message_count(&self, id: &RecordId) -> std::result::Result<Option<usize>, StoreError> {
        Ok(self.get_record(id)?.map(|r| r.messages().len()))
    }

    fn tags(&self, id: &RecordId) -> std::result::Result<Option<BTreeSet<String>>, StoreError> {
        Ok(self.get_record(id)?.map(|r| r.tags().clone()))
    }

    /// Lower-cased roles of the record's message authors.
    fn message_roles(
        &self,
        id: &RecordId,
    ) -> std::result::Result<Option<BTreeSet<String>>, StoreError> {
        Ok(self.get_record(id)?.map(|r| {
            r.messages()
                .iter()
                .map(|m| m.role.trim().to_lowercase())
                .collect()
        }))
    }
}

/// Thread-safe in-memory [`RecordStore`].
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: RwLock<BTreeMap<RecordId, Record>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a JSON array of records, as written by `serde_json`.
    pub fn from_json(json: &str) -> Result<Self> {
        let records: Vec<Record> =
            serde_json::from_str(json).context("Failed to parse record archive JSON")?;
        let store = Self::new();
        for record in records {
            store.insert(record);
        }
        Ok(store)
    }

    /// Inserts or replaces a record, returning the previous version.
    pub fn insert(&self, record: Record) -> Option<Record> {
        self.write().insert(record.id.clone(), record)
    }

    pub fn remove(&self, id: &str) -> Option<Record> {
        self.write().remove(id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // A panic while holding the lock cannot leave a BTreeMap half-updated, so
    // poisoning is ignored.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<RecordId, Record>> {
        self.records
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<RecordId, Record>> {
        self.records
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl RecordStore for MemoryRecordStore {
    fn list_records(&self) -> std::result::Result<RecordIter<'_>, StoreError> {
        let records: Vec<Record> = self.read().values().cloned().collect();
        Ok(Box::new(records.into_iter().map(Ok)))
    }

    fn get_record(&self, id: &RecordId) -> std::result::Result<Option<Record>, StoreError> {
        Ok(self.read().get(id).cloned())
    }

    fn message_count(&self, id: &RecordId) -> std::result::Result<Option<usize>, StoreError> {
        Ok(self.read().get(id).map(|r| r.messages.len()))
    }
}

/// Bounded set of store sessions.
///
/// Cloning shares the same permits.
#[derive(Clone)]
pub struct RecordPool {
    store: Arc<dyn RecordStore>,
    permits: Arc<Semaphore>,
    acquire_timeout: Duration,
}

impl std::fmt::Debug for RecordPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordPool")
            .field("available", &self.permits.available_permits())
            .field("acquire_timeout", &self.acquire_timeout)
            .field("closed", &self.permits.is_closed())
            .finish()
    }
}

impl RecordPool {
    pub fn new(store: Arc<dyn RecordStore>, size: usize, acquire_timeout: Duration) -> Self {
        Self {
            store,
            permits: Arc::new(Semaphore::new(size.max(1))),
            acquire_timeout,
        }
    }

    /// Waits up to the configured timeout for a free session.
    ///
    /// The session is returned to the pool when the [`PooledStore`] is dropped.
    pub async fn acquire(&self) -> std::result::Result<PooledStore, SearchError> {
        match tokio::time::timeout(self.acquire_timeout, self.permits.clone().acquire_owned()).await
        {
            Ok(Ok(permit)) => Ok(PooledStore {
                store: Arc::clone(&self.store),
                _permit: permit,
            }),
            Ok(Err(_closed)) => Err(SearchError::ShutDown),
            Err(_elapsed) => {
                tracing::warn!(
                    "No record store connection available after {:?}",
                    self.acquire_timeout
                );
                Err(SearchError::ResourceExhausted {
                    timeout: self.acquire_timeout,
                })
            }
        }
    }

    /// Number of sessions not currently checked out.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Rejects all future acquisitions. Sessions already handed out stay valid.
    pub fn close(&self) {
        self.permits.close();
    }
}

/// A checked-out store session.
pub struct PooledStore {
    store: Arc<dyn RecordStore>,
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledStore {
    type Target = dyn RecordStore;

    fn deref(&self) -> &Self::Target {
        &*self.store
    }
}
