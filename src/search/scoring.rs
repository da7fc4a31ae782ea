//! Keyword relevance scoring.
//!
//! Each query token found in a record earns the weight of the most important
//! field it occurs in:
//! - 10: title
//! - 8: auto-generated title
//! - 6: tags
//! - 4: summary
//! - 1: message content only
//!
//! On top of that: +20 when the whole query appears verbatim, +5 per tag that
//! contains a query token, and +2 / +1 for records younger than 30 / 90 days.

use super::tokenize::fold_case;
use crate::store::Record;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeSet;

const TITLE_WEIGHT: f32 = 10.0;
const AUTO_TITLE_WEIGHT: f32 = 8.0;
const TAG_WEIGHT: f32 = 6.0;
const SUMMARY_WEIGHT: f32 = 4.0;
const CONTENT_WEIGHT: f32 = 1.0;

const PHRASE_BONUS: f32 = 20.0;
const TAG_MATCH_BONUS: f32 = 5.0;

/// Relevance of one record to one query.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Score {
    pub(crate) score: f32,
    pub(crate) matched_terms: Vec<String>,
    pub(crate) highlights: Vec<(usize, usize)>,
}

/// Scores `record` against the tokenized and raw query.
///
/// `created` is the creation time recorded in the index, `now` the reference
/// point for the recency bonus. A record matching neither a token nor the
/// phrase scores 0.
pub(crate) fn score_record(
    record: &Record,
    created: DateTime<Utc>,
    query_tokens: &BTreeSet<String>,
    raw_query: &str,
    now: DateTime<Utc>,
) -> Score {
    let full_text = record.full_text();
    let body = full_text.to_lowercase();
    // Same byte layout as `full_text`, for highlight offsets
    let folded = fold_case(full_text);

    let title = record.title().to_lowercase();
    let auto_title = record.auto_title().unwrap_or_default().to_lowercase();
    let tags: Vec<String> = record.tags().iter().map(|t| t.to_lowercase()).collect();
    let summary = record.summary().unwrap_or_default().to_lowercase();

    let mut score = 0.0;
    let mut matched_terms = Vec::new();
    let mut highlights = Vec::new();

    for token in query_tokens {
        if !body.contains(token.as_str()) {
            continue;
        }
        score += if title.contains(token.as_str()) {
            TITLE_WEIGHT
        } else if auto_title.contains(token.as_str()) {
            AUTO_TITLE_WEIGHT
        } else if tags.iter().any(|tag| tag.contains(token.as_str())) {
            TAG_WEIGHT
        } else if summary.contains(token.as_str()) {
            SUMMARY_WEIGHT
        } else {
            CONTENT_WEIGHT
        };
        matched_terms.push(token.clone());
        highlights.extend(span_of(&folded, token));
    }

    let phrase = raw_query.trim().to_lowercase();
    let phrase_matched = !phrase.is_empty() && body.contains(&phrase);
    if phrase_matched {
        score += PHRASE_BONUS;
        highlights.extend(span_of(&folded, &fold_case(raw_query.trim())));
    }

    if matched_terms.is_empty() && !phrase_matched {
        return Score {
            score: 0.0,
            matched_terms,
            highlights: vec![],
        };
    }

    let tag_hits = tags
        .iter()
        .filter(|tag| query_tokens.iter().any(|token| tag.contains(token.as_str())))
        .count();
    score += tag_hits as f32 * TAG_MATCH_BONUS;
    score += recency_bonus(created, now);

    highlights.sort_unstable();
    highlights.dedup();

    Score {
        score,
        matched_terms,
        highlights,
    }
}

/// +2 under 30 days old, +1 under 90 days, 0 otherwise.
pub(crate) fn recency_bonus(created: DateTime<Utc>, now: DateTime<Utc>) -> f32 {
    let age = now.signed_duration_since(created);
    if age < Duration::days(30) {
        2.0
    } else if age < Duration::days(90) {
        1.0
    } else {
        0.0
    }
}

/// First occurrence of `needle` in `haystack` as a byte span.
fn span_of(haystack: &str, needle: &str) -> Option<(usize, usize)> {
    if needle.is_empty() {
        return None;
    }
    haystack
        .find(needle)
        .map(|start| (start, start + needle.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::tokenize::tokenize;
    use assert2::check;
    use chrono::TimeZone;
    use rstest::rstest;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn old() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
    }

    fn score(record: &Record, query: &str) -> Score {
        score_record(record, record.create_time(), &tokenize(query), query, now())
    }

    #[test]
    fn test_title_match_beats_content_match() {
        let in_title = Record::new("a", "Anxiety notes", old()).with_message("user", "hello");
        let in_content = Record::new("b", "Notes", old()).with_message("user", "anxiety hello");
        check!(score(&in_title, "anxiety").score > score(&in_content, "anxiety").score);
    }

    #[rstest]
    #[case(Record::new("r", "sleep", old()), 10.0)]
    #[case(Record::new("r", "x", old()).with_auto_title("sleep"), 8.0)]
    #[case(Record::new("r", "x", old()).with_tags(["insomnia"]), 0.0)]
    #[case(Record::new("r", "x", old()).with_tags(["sleep"]), 6.0 + 5.0)]
    #[case(Record::new("r", "x", old()).with_summary("sleep"), 4.0)]
    #[case(Record::new("r", "x", old()).with_message("user", "sleep"), 1.0)]
    fn test_field_weights(#[case] record: Record, #[case] expected: f32) {
        // Empty raw query keeps the phrase bonus out of the comparison
        let result = score_record(&record, old(), &tokenize("sleep"), "", now());
        check!(result.score == expected);
    }

    #[test]
    fn test_highest_field_wins_not_cumulative() {
        let record = Record::new("r", "Sleep", old())
            .with_summary("sleep summary")
            .with_message("user", "sleep sleep");
        let result = score_record(&record, old(), &tokenize("sleep"), "", now());
        check!(result.score == TITLE_WEIGHT);
    }

    #[test]
    fn test_exact_phrase_not_lower_than_out_of_order() {
        let in_order = Record::new("a", "x", old()).with_message("user", "panic attack at night");
        let shuffled = Record::new("b", "x", old()).with_message("user", "attack of panic at night");
        let ordered = score(&in_order, "panic attack");
        let unordered = score(&shuffled, "panic attack");
        check!(ordered.score >= unordered.score);
        check!(ordered.score == unordered.score + PHRASE_BONUS);
    }

    #[test]
    fn test_tag_bonus_per_matching_tag() {
        let record = Record::new("r", "x", old()).with_tags(["work-stress", "stress", "sleep"]);
        let result = score_record(&record, old(), &tokenize("stress"), "", now());
        check!(result.score == TAG_WEIGHT + 2.0 * TAG_MATCH_BONUS);
    }

    #[rstest]
    #[case(0, 2.0)]
    #[case(29, 2.0)]
    #[case(30, 1.0)]
    #[case(89, 1.0)]
    #[case(90, 0.0)]
    #[case(-3, 2.0)]
    fn test_recency_bonus(#[case] age_days: i64, #[case] expected: f32) {
        let created = now() - Duration::days(age_days);
        check!(recency_bonus(created, now()) == expected);
    }

    #[test]
    fn test_matched_terms_and_highlights() {
        let record = Record::new("r", "Anxiety and Stress", old());
        let result = score(&record, "anxiety stress");
        check!(result.matched_terms == vec!["anxiety".to_string(), "stress".to_string()]);
        check!(result.highlights == vec![(0, 7), (12, 18)]);
    }

    #[test]
    fn test_phrase_span_recorded() {
        let record = Record::new("r", "Notes", old()).with_message("user", "Late Night Panic");
        let result = score(&record, "night panic");
        let body = record.full_text();
        let (start, end) = (body.find("Night Panic").unwrap(), body.len());
        check!(result.highlights.contains(&(start, end)));
        check!(&body[start..end] == "Night Panic");
    }

    #[test]
    fn test_no_match_scores_zero() {
        let record = Record::new("r", "Bread", now()).with_tags(["cooking"]);
        let result = score(&record, "anxiety");
        check!(result.score == 0.0);
        check!(result.matched_terms.is_empty());
        check!(result.highlights.is_empty());
    }
}
