//! Query evaluation against one index snapshot.

use super::filter;
use super::index::IndexSnapshot;
use super::scoring::score_record;
use super::tokenize::tokenize;
use crate::store::RecordStore;
use crate::types::{RecordId, SearchFilter, SearchResult};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// Evaluates queries against a fixed snapshot and a checked-out store session.
pub(crate) struct QueryEngine<'a> {
    index: &'a IndexSnapshot,
    store: &'a dyn RecordStore,
    now: DateTime<Utc>,
}

impl<'a> QueryEngine<'a> {
    pub(crate) fn new(
        index: &'a IndexSnapshot,
        store: &'a dyn RecordStore,
        now: DateTime<Utc>,
    ) -> Self {
        Self { index, store, now }
    }

    /// Runs a query in the requested mode. `filter` must be validated.
    ///
    /// Semantic mode falls back to keyword mode when the snapshot has no vector space.
    pub(crate) fn run(
        &self,
        query: &str,
        filter: &SearchFilter,
        limit: usize,
        semantic: bool,
    ) -> Vec<SearchResult> {
        if limit == 0 {
            return vec![];
        }
        let filter = filter.normalized();

        if semantic {
            match self.index.semantic() {
                Ok(_) => return self.semantic(query, &filter, limit),
                Err(reason) => {
                    tracing::warn!(
                        "Semantic search unavailable ({}), falling back to keyword search",
                        reason
                    );
                }
            }
        }
        self.keyword(query, &filter, limit)
    }

    /// AND-match of all query tokens, filtered, scored, best first.
    pub(crate) fn keyword(
        &self,
        query: &str,
        filter: &SearchFilter,
        limit: usize,
    ) -> Vec<SearchResult> {
        let tokens = tokenize(query);
        if tokens.is_empty() {
            return vec![];
        }

        let candidates = self.index.candidates(&tokens);
        let candidates = filter::apply(candidates, filter, self.index, self.store);
        tracing::trace!("{} candidates for '{}'", candidates.len(), query);

        let mut results: Vec<SearchResult> = candidates
            .into_iter()
            .filter_map(|id| {
                let record = match self.store.get_record(&id) {
                    Ok(Some(record)) => record,
                    Ok(None) => {
                        tracing::debug!("'{}' was removed since the last rebuild", id);
                        return None;
                    }
                    Err(e) => {
                        tracing::warn!("Skipping '{}': {}", id, e);
                        return None;
                    }
                };
                let created = self
                    .index
                    .created_at(&id)
                    .unwrap_or_else(|| record.create_time());
                let scored = score_record(&record, created, &tokens, query, self.now);
                (scored.score > 0.0).then(|| SearchResult {
                    record_id: id,
                    score: scored.score,
                    matched_terms: scored.matched_terms,
                    highlights: scored.highlights,
                })
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.record_id.cmp(&b.record_id))
        });
        results.truncate(limit);
        results
    }

    /// Cosine ranking over the TF-IDF space, filtered, best first.
    fn semantic(&self, query: &str, filter: &SearchFilter, limit: usize) -> Vec<SearchResult> {
        let Ok(space) = self.index.semantic() else {
            return vec![];
        };
        let mut ranked = space.rank(query);

        if !filter.is_empty() {
            let candidates: BTreeSet<RecordId> = ranked.iter().map(|(id, _)| id.clone()).collect();
            let allowed = filter::apply(candidates, filter, self.index, self.store);
            ranked.retain(|(id, _)| allowed.contains(id));
        }

        ranked
            .into_iter()
            .take(limit)
            .map(|(record_id, similarity)| SearchResult {
                record_id,
                score: similarity,
                matched_terms: vec![],
                highlights: vec![],
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SemanticConfig;
    use crate::search::semantic::{DisabledIndexer, TfIdfIndexer};
    use crate::store::{MemoryRecordStore, Record};
    use assert2::check;
    use chrono::{Duration, TimeZone};
    use rstest::{fixture, rstest};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn result_ids(results: &[SearchResult]) -> Vec<&str> {
        results.iter().map(|r| r.record_id.as_str()).collect()
    }

    #[fixture]
    fn store() -> MemoryRecordStore {
        let created = now() - Duration::days(10);
        let store = MemoryRecordStore::new();
        store.insert(
            Record::new("c1", "Anxiety and Stress", created)
                .with_tags(["anxiety"])
                .with_message("user", "Work deadlines pile up"),
        );
        store.insert(
            Record::new("c2", "Unrelated", created)
                .with_message("user", "A little anxiety about the trip"),
        );
        store.insert(
            Record::new("c3", "Trip planning", created)
                .with_message("user", "Trip anxiety and packing lists"),
        );
        store
    }

    #[rstest]
    fn test_keyword_orders_by_score(store: MemoryRecordStore) {
        let index = IndexSnapshot::build(&store, &DisabledIndexer, 1).unwrap();
        let engine = QueryEngine::new(&index, &store, now());
        let results = engine.run("anxiety", &SearchFilter::new(), 10, false);
        // c2 and c3 tie on score and fall back to id order
        check!(result_ids(&results) == vec!["c1", "c2", "c3"]);
        check!(results[1].score == results[2].score);
    }

    #[rstest]
    fn test_all_terms_required(store: MemoryRecordStore) {
        let index = IndexSnapshot::build(&store, &DisabledIndexer, 1).unwrap();
        let engine = QueryEngine::new(&index, &store, now());
        let results = engine.run("anxiety trip", &SearchFilter::new(), 10, false);
        check!(result_ids(&results) == vec!["c3", "c2"]);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("the and for")]
    #[case("a an")]
    fn test_queries_without_tokens_match_nothing(store: MemoryRecordStore, #[case] query: &str) {
        let index = IndexSnapshot::build(&store, &DisabledIndexer, 1).unwrap();
        let engine = QueryEngine::new(&index, &store, now());
        check!(engine.run(query, &SearchFilter::new(), 10, false).is_empty());
    }

    #[rstest]
    fn test_limit_truncates(store: MemoryRecordStore) {
        let index = IndexSnapshot::build(&store, &DisabledIndexer, 1).unwrap();
        let engine = QueryEngine::new(&index, &store, now());
        check!(engine.run("anxiety", &SearchFilter::new(), 2, false).len() == 2);
        check!(engine.run("anxiety", &SearchFilter::new(), 0, false).is_empty());
    }

    #[rstest]
    fn test_record_removed_after_build_is_skipped(store: MemoryRecordStore) {
        let index = IndexSnapshot::build(&store, &DisabledIndexer, 1).unwrap();
        store.remove("c1");
        let engine = QueryEngine::new(&index, &store, now());
        let results = engine.run("anxiety", &SearchFilter::new(), 10, false);
        check!(result_ids(&results) == vec!["c2", "c3"]);
    }

    #[rstest]
    fn test_semantic_falls_back_to_keyword(store: MemoryRecordStore) {
        let index = IndexSnapshot::build(&store, &DisabledIndexer, 1).unwrap();
        let engine = QueryEngine::new(&index, &store, now());
        let semantic = engine.run("anxiety", &SearchFilter::new(), 10, true);
        let keyword = engine.run("anxiety", &SearchFilter::new(), 10, false);
        check!(semantic == keyword);
    }

    #[rstest]
    fn test_semantic_results_have_no_highlights(store: MemoryRecordStore) {
        let indexer = TfIdfIndexer::new(SemanticConfig::default());
        let index = IndexSnapshot::build(&store, &indexer, 1).unwrap();
        let engine = QueryEngine::new(&index, &store, now());

        let results = engine.run("trip anxiety", &SearchFilter::new(), 10, true);
        check!(!results.is_empty());
        for result in &results {
            check!(result.score > 0.1);
            check!(result.score <= 1.0);
            check!(result.matched_terms.is_empty());
            check!(result.highlights.is_empty());
        }
    }

    #[rstest]
    fn test_semantic_results_are_filtered(store: MemoryRecordStore) {
        let indexer = TfIdfIndexer::new(SemanticConfig::default());
        let index = IndexSnapshot::build(&store, &indexer, 1).unwrap();
        let engine = QueryEngine::new(&index, &store, now());

        let filter = SearchFilter::new().tags(["anxiety"]);
        let results = engine.run("trip anxiety", &filter, 10, true);
        for result in &results {
            check!(result.record_id.as_str() == "c1");
        }
    }
}
