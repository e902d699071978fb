//! Keyword ranking used when the remote ranker fails.
//!
//! Score = Jaccard(query tokens, item tokens) + title boost + tag boost, where
//! item tokens come from the title, the item's free text and its tags. Items
//! at or below the threshold are dropped; ties keep input order.

use std::collections::HashSet;

use crate::{config::FallbackConfig, items::Searchable};

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "is", "it", "to", "of", "and", "in", "for", "on", "with", "as", "at", "by",
    "from", "this", "that", "was", "are", "been", "be", "have", "has", "had", "will", "would",
    "can", "could", "should",
];

/// Shortest token kept, in characters.
const MIN_TOKEN_CHARS: usize = 3;

/// Lowercase word tokens, stop words and short words removed.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|word| word.chars().count() >= MIN_TOKEN_CHARS && !STOP_WORDS.contains(word))
        .map(|word| word.to_string())
        .collect()
}

/// |a ∩ b| / |a ∪ b|, 0 when both are empty.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f32 / union as f32
}

fn item_tokens<T: Searchable>(item: &T) -> HashSet<String> {
    let mut tokens: HashSet<String> = tokenize(item.title()).into_iter().collect();
    if let Some(text) = item.keyword_text() {
        tokens.extend(tokenize(text));
    }
    for tag in item.tags() {
        tokens.extend(tokenize(tag));
    }
    tokens
}

pub fn score<T: Searchable>(
    item: &T,
    query: &str,
    query_tokens: &HashSet<String>,
    config: &FallbackConfig,
) -> f32 {
    let mut score = jaccard(query_tokens, &item_tokens(item));

    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return score;
    }

    if item.title().to_lowercase().contains(&needle) {
        score += config.title_boost;
    }
    if item
        .tags()
        .iter()
        .any(|tag| tag.to_lowercase().contains(&needle))
    {
        score += config.tag_boost;
    }

    score
}

/// Ranked items with their scores, best first.
pub fn rank_scored<'a, T: Searchable>(
    items: &'a [T],
    query: &str,
    config: &FallbackConfig,
) -> Vec<(&'a T, f32)> {
    let query_tokens: HashSet<String> = tokenize(query).into_iter().collect();

    let mut scored: Vec<(&T, f32)> = items
        .iter()
        .map(|item| (item, score(item, query, &query_tokens, config)))
        .filter(|(_, score)| *score > config.threshold)
        .collect();

    // stable: equal scores keep input order
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    scored
}

pub fn rank<'a, T: Searchable>(items: &'a [T], query: &str, config: &FallbackConfig) -> Vec<&'a T> {
    rank_scored(items, query, config)
        .into_iter()
        .map(|(item, _)| item)
        .collect()
}
