//! Text tokenization for keyword indexing.

use std::collections::BTreeSet;

/// Tokens must be longer than this many characters to be indexed.
const MIN_TOKEN_LENGTH: usize = 2;

/// Common English stop words to filter out from indexing.
/// Only entries longer than [`MIN_TOKEN_LENGTH`] can ever match.
pub(crate) const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "had", "has", "have",
    "her", "his", "him", "she", "its", "was", "were", "been", "being", "will", "would", "could",
    "should", "shall", "may", "might", "must", "does", "did", "this", "that", "these", "those",
    "with", "from", "into", "they", "them", "their", "what", "which", "who", "whom", "when",
    "than", "then", "also", "nor", "yet",
];

/// Normalizes text into the set of indexable tokens.
///
/// Lower-cases, splits on anything that is not alphanumeric, and drops tokens of
/// length ≤ 2 as well as [`STOP_WORDS`].
pub fn tokenize(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() > MIN_TOKEN_LENGTH)
        .map(str::to_lowercase)
        .filter(|word| !STOP_WORDS.contains(&word.as_str()))
        .collect()
}

/// Lower-cases `text` without changing any byte offsets.
///
/// Characters whose lowercase form has a different UTF-8 length (or expands to
/// several characters) are left as they are, so spans found in the folded text
/// are valid spans into the original.
pub(crate) fn fold_case(text: &str) -> String {
    let mut folded = String::with_capacity(text.len());
    for c in text.chars() {
        let mut lower = c.to_lowercase();
        match (lower.next(), lower.next()) {
            (Some(l), None) if l.len_utf8() == c.len_utf8() => folded.push(l),
            _ => folded.push(c),
        }
    }
    folded
}
