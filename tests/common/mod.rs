//! Shared test fixtures for integration tests.
//!
//! # Available Fixtures
//!
//! - `scenario_store`: the two-record corpus (C1 on-topic, C2 passing mention)
//! - `archive_store`: a larger corpus with enough overlap for a TF-IDF vocabulary
//!
//! [`FlakyStore`] and [`GatedStore`] wrap a [`MemoryRecordStore`] to inject
//! build failures and to hold a rebuild mid-flight.

#![allow(dead_code)] // Helpers are used across different integration test crates

use chat_archive_search::{
    MemoryRecordStore, Record, RecordId, RecordIter, RecordStore, SearchConfig, SearchManager,
    SearchResult, StoreError,
};
use chrono::{DateTime, Duration, Utc};
use rstest::fixture;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};

/// A point in time `days` before now.
pub fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(days)
}

pub fn ids(results: &[SearchResult]) -> Vec<&str> {
    results.iter().map(|r| r.record_id.as_str()).collect()
}

/// Config with a short pool timeout so exhaustion tests stay fast.
pub fn config(pool_size: usize) -> SearchConfig {
    SearchConfig {
        pool_size,
        acquire_timeout_ms: 100,
        ..SearchConfig::default()
    }
}

pub fn c1() -> Record {
    Record::new("C1", "Anxiety and Stress", days_ago(200))
        .with_tags(["anxiety"])
        .with_message("user", "Deadlines keep piling up at work")
        .with_message("assistant", "Let's break them into smaller steps")
}

pub fn c2() -> Record {
    Record::new("C2", "Unrelated", days_ago(200))
        .with_message("user", "Planning a trip, a bit of anxiety about flying")
        .with_message("assistant", "Window seats can help")
}

#[fixture]
pub fn scenario_store() -> Arc<MemoryRecordStore> {
    let store = MemoryRecordStore::new();
    store.insert(c1());
    store.insert(c2());
    Arc::new(store)
}

#[fixture]
pub fn archive_store() -> Arc<MemoryRecordStore> {
    let store = MemoryRecordStore::new();
    store.insert(
        Record::new("sleep-1", "Trouble sleeping", days_ago(5))
            .with_tags(["sleep", "health"])
            .with_message("user", "I keep waking up at night and cannot fall asleep again")
            .with_message("assistant", "A consistent bedtime routine helps sleep quality"),
    );
    store.insert(
        Record::new("sleep-2", "Bedtime routine", days_ago(40))
            .with_tags(["sleep"])
            .with_message("user", "What bedtime routine improves sleep quality")
            .with_message("assistant", "Dim lights and no screens an hour before bed"),
    );
    store.insert(
        Record::new("work-1", "Work deadlines", days_ago(120))
            .with_tags(["work", "stress"])
            .with_message("user", "Project deadlines are stressing me out")
            .with_message("assistant", "Prioritise the deadlines that block other people"),
    );
    store.insert(
        Record::new("work-2", "Team meeting notes", days_ago(10))
            .with_tags(["work"])
            .with_summary("Agenda for the project review meeting")
            .with_message("user", "Summarise the project review meeting")
            .with_message("system", "Meeting transcript attached"),
    );
    store.insert(
        Record::new("cook-1", "Sourdough starter", days_ago(300))
            .with_tags(["cooking"])
            .with_message("user", "My sourdough starter smells like acetone")
            .with_message("assistant", "Feed the starter more often"),
    );
    Arc::new(store)
}

/// Opens a manager over `store` with default config, panicking if the build fails.
pub async fn open(store: Arc<dyn RecordStore>) -> SearchManager {
    chat_archive_search::tracing::init();
    SearchManager::open(store, &SearchConfig::default())
        .await
        .expect("initial index build")
}

/// Store whose listing fails while `failing` is set.
#[derive(Debug, Default)]
pub struct FlakyStore {
    pub inner: MemoryRecordStore,
    failing: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: MemoryRecordStore) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl RecordStore for FlakyStore {
    fn list_records(&self) -> Result<RecordIter<'_>, StoreError> {
        if !self.failing.load(Ordering::SeqCst) {
            return self.inner.list_records();
        }
        // Fail part-way through so a partial build would be observable
        let mut records = self.inner.list_records()?;
        let first = records.next();
        Ok(Box::new(first.into_iter().chain(std::iter::once(Err(
            StoreError::Unavailable("connection reset".to_string()),
        )))))
    }

    fn get_record(&self, id: &RecordId) -> Result<Option<Record>, StoreError> {
        self.inner.get_record(id)
    }
}

/// Store whose listing blocks while the gate is closed.
#[derive(Debug, Default)]
pub struct GatedStore {
    pub inner: MemoryRecordStore,
    closed: Mutex<bool>,
    opened: Condvar,
    waiting: AtomicUsize,
}

impl GatedStore {
    pub fn new(inner: MemoryRecordStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    pub fn close(&self) {
        *self.closed.lock().unwrap() = true;
    }

    pub fn open(&self) {
        *self.closed.lock().unwrap() = false;
        self.opened.notify_all();
    }

    /// Polls until a listing is parked at the gate.
    pub async fn wait_for_listing(&self) {
        while self.waiting.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    }
}

impl RecordStore for GatedStore {
    fn list_records(&self) -> Result<RecordIter<'_>, StoreError> {
        let mut closed = self.closed.lock().unwrap();
        if *closed {
            self.waiting.fetch_add(1, Ordering::SeqCst);
            while *closed {
                closed = self.opened.wait(closed).unwrap();
            }
            self.waiting.fetch_sub(1, Ordering::SeqCst);
        }
        drop(closed);
        self.inner.list_records()
    }

    fn get_record(&self, id: &RecordId) -> Result<Option<Record>, StoreError> {
        self.inner.get_record(id)
    }
}
