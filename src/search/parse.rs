//! Index-array extraction from untrusted model output.

use once_cell::sync::Lazy;
use regex::Regex;

static INDEX_ARRAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[0-9,\s]+\]").expect("valid index array regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexParse {
    Indices(Vec<usize>),
    /// No bracketed run of digits anywhere in the answer.
    NoArray,
    /// An array was found but is not a valid integer list, e.g. `[1,,2]`.
    Malformed(String),
}

/// Takes the first `[d, d, ...]` in `answer`. Indices are returned as found,
/// unfiltered; numbers too large for `usize` saturate so range checks drop them.
pub fn parse_index_array(answer: &str) -> IndexParse {
    let Some(found) = INDEX_ARRAY.find(answer) else {
        return IndexParse::NoArray;
    };

    let raw = found.as_str();
    let inner = raw[1..raw.len() - 1].trim();
    if inner.is_empty() {
        return IndexParse::Indices(Vec::new());
    }

    let mut indices = Vec::new();
    for token in inner.split(',') {
        let token = token.trim();
        if token.is_empty() || !token.chars().all(|c| c.is_ascii_digit()) {
            return IndexParse::Malformed(raw.to_string());
        }
        indices.push(token.parse::<usize>().unwrap_or(usize::MAX));
    }

    IndexParse::Indices(indices)
}

/// Keeps indices in `[0, len)`, first occurrence only, in the given order.
pub fn select_indices(indices: &[usize], len: usize) -> Vec<usize> {
    let mut seen = vec![false; len];
    indices
        .iter()
        .copied()
        .filter(|&idx| idx < len && !std::mem::replace(&mut seen[idx], true))
        .collect()
}
