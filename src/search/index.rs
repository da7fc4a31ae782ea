//! Inverted word and tag indices over the record store.
//!
//! An [`IndexSnapshot`] is immutable once built. Rebuilding produces a new
//! snapshot that the manager publishes by swapping an `Arc`, so readers only ever
//! see a complete index.

use super::semantic::{SemanticIndexer, TfIdfIndex};
use super::tokenize::tokenize;
use crate::error::{SemanticIndexUnavailable, StoreError};
use crate::store::RecordStore;
use crate::types::{IndexStats, RecordId};
use ahash::AHashMap;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// Term → records, tag → records, record → creation time, and the optional vector space.
#[derive(Debug)]
pub(crate) struct IndexSnapshot {
    word_index: AHashMap<String, BTreeSet<RecordId>>,
    tag_index: AHashMap<String, BTreeSet<RecordId>>,
    date_index: AHashMap<RecordId, DateTime<Utc>>,
    semantic: Result<TfIdfIndex, SemanticIndexUnavailable>,
    generation: u64,
}

impl IndexSnapshot {
    /// The unbuilt index: matches nothing.
    pub(crate) fn empty() -> Self {
        Self {
            word_index: AHashMap::new(),
            tag_index: AHashMap::new(),
            date_index: AHashMap::new(),
            semantic: Err(SemanticIndexUnavailable::EmptyCorpus),
            generation: 0,
        }
    }

    /// Reads every record from `store` and indexes it.
    ///
    /// A store error at any point abandons the partially built maps.
    pub(crate) fn build(
        store: &dyn RecordStore,
        indexer: &dyn SemanticIndexer,
        generation: u64,
    ) -> Result<Self, StoreError> {
        let mut word_index: AHashMap<String, BTreeSet<RecordId>> = AHashMap::new();
        let mut tag_index: AHashMap<String, BTreeSet<RecordId>> = AHashMap::new();
        let mut date_index = AHashMap::new();
        let mut documents = Vec::new();

        for record in store.list_records()? {
            let record = record?;
            let id = record.id();

            for token in tokenize(record.full_text()) {
                word_index.entry(token).or_default().insert(id.clone());
            }
            for tag in record.tags() {
                let tag = tag.trim().to_lowercase();
                if !tag.is_empty() {
                    tag_index.entry(tag).or_default().insert(id.clone());
                }
            }
            date_index.insert(id.clone(), record.create_time());
            documents.push((id.clone(), record.full_text().to_string()));
        }

        let semantic = indexer.build(&documents);
        if let Err(reason) = &semantic {
            tracing::debug!("Semantic index not built: {}", reason);
        }

        Ok(Self {
            word_index,
            tag_index,
            date_index,
            semantic,
            generation,
        })
    }

    /// Records containing every token (AND semantics). No tokens → no candidates.
    pub(crate) fn candidates(&self, tokens: &BTreeSet<String>) -> BTreeSet<RecordId> {
        let mut postings = Vec::with_capacity(tokens.len());
        for token in tokens {
            match self.word_index.get(token) {
                Some(ids) => postings.push(ids),
                None => return BTreeSet::new(),
            }
        }
        // Intersect starting from the rarest term
        postings.sort_by_key(|ids| ids.len());

        let Some((first, rest)) = postings.split_first() else {
            return BTreeSet::new();
        };
        first
            .iter()
            .filter(|id| rest.iter().all(|ids| ids.contains(*id)))
            .cloned()
            .collect()
    }

    /// Records carrying any of `tags` (already normalized).
    pub(crate) fn tagged_with(&self, tags: &BTreeSet<String>) -> BTreeSet<RecordId> {
        tags.iter()
            .filter_map(|tag| self.tag_index.get(tag))
            .flatten()
            .cloned()
            .collect()
    }

    pub(crate) fn created_at(&self, id: &RecordId) -> Option<DateTime<Utc>> {
        self.date_index.get(id).copied()
    }

    pub(crate) const fn semantic(&self) -> Result<&TfIdfIndex, SemanticIndexUnavailable> {
        match &self.semantic {
            Ok(index) => Ok(index),
            Err(reason) => Err(*reason),
        }
    }

    pub(crate) const fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn stats(&self) -> IndexStats {
        IndexStats {
            indexed_words: self.word_index.len(),
            indexed_tags: self.tag_index.len(),
            indexed_records: self.date_index.len(),
            semantic_index_built: self.semantic.is_ok(),
            generation: self.generation,
        }
    }
}
