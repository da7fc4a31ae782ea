//! TF-IDF document vectors and cosine-similarity ranking.
//!
//! The vectorizer follows the usual bag-of-n-grams recipe: lower-case words of
//! two or more word characters, English stop words removed, 1..=`ngram_max` word
//! n-grams, terms kept only if they occur in at least `min_df` records, and the
//! `max_features` most frequent of those forming the vocabulary. Weights are
//! `tf * (ln((1 + n) / (1 + df)) + 1)` and every row is L2-normalized, so the
//! cosine similarity of two rows is their dot product.

use crate::config::SemanticConfig;
use crate::error::SemanticIndexUnavailable;
use crate::types::RecordId;
use ahash::AHashMap;
use regex::Regex;
use std::fmt::Debug;
use std::sync::LazyLock;

/// Words of at least two word characters.
static WORD_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w\w+\b").expect("word pattern is a valid regex"));

/// English stop words removed before n-grams are formed.
const ENGLISH_STOP_WORDS: &[&str] = &[
    "about", "above", "after", "again", "against", "all", "almost", "also", "although", "always",
    "am", "among", "an", "and", "another", "any", "anyhow", "anyone", "anything", "anyway", "are",
    "around", "as", "at", "be", "became", "because", "become", "been", "before", "being", "below",
    "beside", "between", "both", "but", "by", "can", "cannot", "could", "did", "do", "does",
    "doing", "done", "down", "during", "each", "either", "else", "enough", "etc", "even", "ever",
    "every", "few", "for", "from", "further", "had", "has", "have", "he", "her", "here", "hers",
    "herself", "him", "himself", "his", "how", "however", "if", "in", "into", "is", "it", "its",
    "itself", "just", "least", "less", "made", "many", "may", "me", "might", "mine", "more",
    "most", "much", "must", "my", "myself", "neither", "never", "no", "nor", "not", "now", "of",
    "off", "often", "on", "once", "one", "only", "or", "other", "others", "otherwise", "our",
    "ours", "ourselves", "out", "over", "own", "per", "perhaps", "rather", "same", "she",
    "should", "since", "so", "some", "still", "such", "than", "that", "the", "their", "theirs",
    "them", "themselves", "then", "there", "these", "they", "this", "those", "though", "through",
    "thus", "to", "too", "toward", "under", "until", "up", "upon", "us", "very", "via", "was",
    "we", "well", "were", "what", "whatever", "when", "where", "whether", "which", "while", "who",
    "whoever", "whole", "whom", "whose", "why", "will", "with", "within", "without", "would",
    "yet", "you", "your", "yours", "yourself", "yourselves",
];

/// Sparse row: `(term index, weight)` sorted by term index.
type SparseVector = Vec<(usize, f32)>;

/// Capability that turns the corpus into a searchable vector space.
///
/// Selected once at construction time (see [`SearchConfig::indexer`](crate::SearchConfig::indexer)).
pub trait SemanticIndexer: Send + Sync + Debug {
    /// Fits a vector space over `(record id, full text)` documents.
    fn build(&self, documents: &[(RecordId, String)])
    -> Result<TfIdfIndex, SemanticIndexUnavailable>;
}

/// Stand-in used when semantic search is switched off. Always unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledIndexer;

impl SemanticIndexer for DisabledIndexer {
    fn build(
        &self,
        _documents: &[(RecordId, String)],
    ) -> Result<TfIdfIndex, SemanticIndexUnavailable> {
        Err(SemanticIndexUnavailable::Disabled)
    }
}

/// TF-IDF vectorizer.
#[derive(Debug, Clone)]
pub struct TfIdfIndexer {
    config: SemanticConfig,
}

impl TfIdfIndexer {
    pub const fn new(config: SemanticConfig) -> Self {
        Self { config }
    }
}

impl SemanticIndexer for TfIdfIndexer {
    fn build(
        &self,
        documents: &[(RecordId, String)],
    ) -> Result<TfIdfIndex, SemanticIndexUnavailable> {
        if documents.is_empty() {
            return Err(SemanticIndexUnavailable::EmptyCorpus);
        }
        let ngram_max = self.config.ngram_max.max(1);

        let doc_terms: Vec<AHashMap<String, u32>> = documents
            .iter()
            .map(|(_, text)| count_terms(text, ngram_max))
            .collect();

        // Document frequency and corpus-wide frequency per term
        let mut stats: AHashMap<&str, (usize, u64)> = AHashMap::new();
        for terms in &doc_terms {
            for (term, count) in terms {
                let entry = stats.entry(term.as_str()).or_insert((0, 0));
                entry.0 += 1;
                entry.1 += u64::from(*count);
            }
        }

        let mut kept: Vec<(&str, usize, u64)> = stats
            .into_iter()
            .filter(|(_, (df, _))| *df >= self.config.min_df)
            .map(|(term, (df, total))| (term, df, total))
            .collect();
        if kept.is_empty() {
            return Err(SemanticIndexUnavailable::EmptyVocabulary);
        }

        // Most frequent first, alphabetical among equals
        kept.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| a.0.cmp(b.0)));
        kept.truncate(self.config.max_features.max(1));
        kept.sort_by(|a, b| a.0.cmp(b.0));

        let n_docs = documents.len() as f32;
        let mut vocabulary = AHashMap::with_capacity(kept.len());
        let mut idf = Vec::with_capacity(kept.len());
        for (index, (term, df, _)) in kept.iter().enumerate() {
            vocabulary.insert((*term).to_string(), index);
            idf.push(((1.0 + n_docs) / (1.0 + *df as f32)).ln() + 1.0);
        }

        let mut index = TfIdfIndex {
            vocabulary,
            idf,
            rows: Vec::with_capacity(documents.len()),
            ids: documents.iter().map(|(id, _)| id.clone()).collect(),
            ngram_max,
            min_similarity: self.config.min_similarity,
        };
        let rows = doc_terms.iter().map(|terms| index.weigh(terms)).collect();
        index.rows = rows;

        tracing::debug!(
            "Fitted TF-IDF space: {} documents, {} terms",
            index.ids.len(),
            index.idf.len()
        );
        Ok(index)
    }
}

/// Fitted document-term matrix.
#[derive(Debug, Clone)]
pub struct TfIdfIndex {
    vocabulary: AHashMap<String, usize>,
    idf: Vec<f32>,
    /// One normalized row per document, aligned with `ids`
    rows: Vec<SparseVector>,
    ids: Vec<RecordId>,
    ngram_max: usize,
    min_similarity: f32,
}

impl TfIdfIndex {
    /// Records whose cosine similarity to `query` is strictly above the configured
    /// threshold, most similar first, ties by record id.
    pub fn rank(&self, query: &str) -> Vec<(RecordId, f32)> {
        let query_vector = self.weigh(&count_terms(query, self.ngram_max));
        if query_vector.is_empty() {
            return vec![];
        }

        let mut ranked: Vec<(RecordId, f32)> = self
            .rows
            .iter()
            .zip(&self.ids)
            .filter_map(|(row, id)| {
                let similarity = dot(&query_vector, row).clamp(-1.0, 1.0);
                (similarity > self.min_similarity).then(|| (id.clone(), similarity))
            })
            .collect();

        ranked.sort_by(|(id_a, a), (id_b, b)| b.total_cmp(a).then_with(|| id_a.cmp(id_b)));
        ranked
    }

    pub fn vocabulary_len(&self) -> usize {
        self.idf.len()
    }

    pub fn document_count(&self) -> usize {
        self.ids.len()
    }

    /// TF-IDF weights for raw term counts, L2-normalized. Out-of-vocabulary terms are dropped.
    fn weigh(&self, terms: &AHashMap<String, u32>) -> SparseVector {
        let mut vector: SparseVector = terms
            .iter()
            .filter_map(|(term, count)| {
                self.vocabulary
                    .get(term)
                    .map(|&index| (index, *count as f32 * self.idf[index]))
            })
            .collect();

        let norm = vector.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
        if norm == 0.0 {
            return vec![];
        }
        for (_, weight) in &mut vector {
            *weight /= norm;
        }
        vector.sort_unstable_by_key(|(index, _)| *index);
        vector
    }
}

/// Counts 1..=`ngram_max` word n-grams of `text` after stop-word removal.
fn count_terms(text: &str, ngram_max: usize) -> AHashMap<String, u32> {
    let lowered = text.to_lowercase();
    let words: Vec<&str> = WORD_PATTERN
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|word| !ENGLISH_STOP_WORDS.contains(word))
        .collect();

    let mut counts = AHashMap::new();
    for n in 1..=ngram_max {
        for window in words.windows(n) {
            *counts.entry(window.join(" ")).or_insert(0) += 1;
        }
    }
    counts
}

/// Dot product of two index-sorted sparse vectors.
fn dot(a: &[(usize, f32)], b: &[(usize, f32)]) -> f32 {
    let (mut i, mut j, mut sum) = (0, 0, 0.0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                sum += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    sum
}
