//! Candidate narrowing by date, tag, message count, and message role.

use super::index::IndexSnapshot;
use crate::store::RecordStore;
use crate::types::{RecordId, SearchFilter};
use std::collections::BTreeSet;

/// Removes candidates that fail `filter`. Never adds any.
///
/// `filter` must already be normalized (lower-cased tags and roles). Records that
/// vanished from the store, or whose metadata cannot be read, are dropped.
pub(crate) fn apply(
    mut candidates: BTreeSet<RecordId>,
    filter: &SearchFilter,
    index: &IndexSnapshot,
    store: &dyn RecordStore,
) -> BTreeSet<RecordId> {
    if filter.date_start.is_some() || filter.date_end.is_some() {
        candidates.retain(|id| {
            index.created_at(id).is_some_and(|created| {
                filter.date_start.is_none_or(|start| created >= start)
                    && filter.date_end.is_none_or(|end| created <= end)
            })
        });
    }

    if let Some(tags) = &filter.tags {
        let tagged = index.tagged_with(tags);
        candidates.retain(|id| tagged.contains(id));
    }

    if filter.min_messages.is_some() || filter.max_messages.is_some() {
        candidates.retain(|id| match store.message_count(id) {
            Ok(Some(count)) => {
                filter.min_messages.is_none_or(|min| count >= min)
                    && filter.max_messages.is_none_or(|max| count <= max)
            }
            Ok(None) => false,
            Err(e) => {
                tracing::warn!("Dropping '{}': message count unavailable: {}", id, e);
                false
            }
        });
    }

    if let Some(roles) = &filter.role_filter {
        candidates.retain(|id| match store.message_roles(id) {
            Ok(Some(present)) => !present.is_disjoint(roles),
            Ok(None) => false,
            Err(e) => {
                tracing::warn!("Dropping '{}': message roles unavailable: {}", id, e);
                false
            }
        });
    }

    candidates
}
