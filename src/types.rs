//! Value types shared by the index, the query engine, and callers.

use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;

/// Stable identifier of an archived record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for RecordId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Narrowing criteria applied after the index lookup.
///
/// All bounds are inclusive. Unset fields do not filter. Serializes only the
/// fields that are set, which keeps cache keys stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_end: Option<DateTime<Utc>>,
    /// OR semantics: a record qualifies if it carries any of these tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_messages: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_messages: Option<usize>,
    /// Rejected by [`SearchFilter::validate`]: there is no sentiment data to filter on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment_filter: Option<String>,
    /// OR semantics: a record qualifies if any of its messages has one of these roles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_filter: Option<BTreeSet<String>>,
}

impl SearchFilter {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn date_range(
        mut self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Self {
        self.date_start = start;
        self.date_end = end;
        self
    }

    #[must_use]
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn message_bounds(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.min_messages = min;
        self.max_messages = max;
        self
    }

    #[must_use]
    pub fn roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.role_filter = Some(roles.into_iter().map(Into::into).collect());
        self
    }

    /// Rejects filters that cannot be evaluated consistently.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let (Some(min), Some(max)) = (self.min_messages, self.max_messages)
            && min > max
        {
            return Err(ValidationError::MessageBounds { min, max });
        }
        if let (Some(start), Some(end)) = (self.date_start, self.date_end)
            && start > end
        {
            return Err(ValidationError::DateRange);
        }
        if self.sentiment_filter.is_some() {
            return Err(ValidationError::UnsupportedFilter("sentiment_filter"));
        }
        Ok(())
    }

    /// True when no field narrows the candidate set.
    pub const fn is_empty(&self) -> bool {
        self.date_start.is_none()
            && self.date_end.is_none()
            && self.tags.is_none()
            && self.min_messages.is_none()
            && self.max_messages.is_none()
            && self.role_filter.is_none()
    }

    /// Copy with tags and roles lower-cased and trimmed, as they are stored in the index.
    ///
    /// A tag or role set left empty (given empty, or only blanks) constrains nothing
    /// and becomes `None`.
    pub(crate) fn normalized(&self) -> Self {
        let normalize = |set: &BTreeSet<String>| -> BTreeSet<String> {
            set.iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        };
        Self {
            tags: self.tags.as_ref().map(normalize).filter(|set| !set.is_empty()),
            role_filter: self
                .role_filter
                .as_ref()
                .map(normalize)
                .filter(|set| !set.is_empty()),
            ..self.clone()
        }
    }
}

/// One ranked hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub record_id: RecordId,
    /// Keyword relevance, or cosine similarity in semantic mode.
    pub score: f32,
    /// Query terms found in the record, alphabetical. Empty in semantic mode.
    pub matched_terms: Vec<String>,
    /// Byte spans into [`Record::full_text`](crate::Record::full_text). Empty in semantic mode.
    pub highlights: Vec<(usize, usize)>,
}

/// Snapshot of index sizes reported by [`SearchManager::get_stats`](crate::SearchManager::get_stats).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub indexed_words: usize,
    pub indexed_tags: usize,
    pub indexed_records: usize,
    pub semantic_index_built: bool,
    /// Incremented on every successful rebuild; 0 means never built.
    pub generation: u64,
}
