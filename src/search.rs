//! Key search collaborator
//!
//! Pattern scans over the key space of a store. Modes operate on raw bytes;
//! the `edit` mode alone interprets keys as UTF-8 for character-level
//! distance, with `editbin` as the byte-level variant.

use std::str::FromStr;

use regex::bytes::Regex;

use crate::backend::Backend;
use crate::error::{HelixError, Result};

/// Supported search modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// Keys containing the pattern as a substring
    Contain,
    /// Keys beginning with the pattern
    Begin,
    /// Keys ending with the pattern
    End,
    /// Keys matching the pattern as a regular expression
    Regex,
    /// Keys ranked by UTF-8 character edit distance to the pattern
    Edit,
    /// Keys ranked by byte edit distance to the pattern
    EditBin,
    /// Case-insensitive substring match
    ContainCase,
    /// Substring match on word boundaries
    ContainWord,
    /// Case-insensitive substring match on word boundaries
    ContainCaseWord,
    /// Keys above the pattern in key order (ordered backends only)
    Upper,
    /// Keys at or above the pattern in key order (ordered backends only)
    UpperInclusive,
    /// Keys below the pattern in key order (ordered backends only)
    Lower,
    /// Keys at or below the pattern in key order (ordered backends only)
    LowerInclusive,
}

impl FromStr for SearchMode {
    type Err = HelixError;

    fn from_str(mode: &str) -> Result<Self> {
        match mode {
            "contain" => Ok(SearchMode::Contain),
            "begin" => Ok(SearchMode::Begin),
            "end" => Ok(SearchMode::End),
            "regex" => Ok(SearchMode::Regex),
            "edit" => Ok(SearchMode::Edit),
            "editbin" => Ok(SearchMode::EditBin),
            "containcase" => Ok(SearchMode::ContainCase),
            "containword" => Ok(SearchMode::ContainWord),
            "containcaseword" => Ok(SearchMode::ContainCaseWord),
            "upper" => Ok(SearchMode::Upper),
            "upperinc" => Ok(SearchMode::UpperInclusive),
            "lower" => Ok(SearchMode::Lower),
            "lowerinc" => Ok(SearchMode::LowerInclusive),
            other => Err(HelixError::InvalidArgument(format!(
                "unknown search mode: {}",
                other
            ))),
        }
    }
}

impl SearchMode {
    /// True for the boundary-scan modes that need an ordered backend
    pub fn needs_order(self) -> bool {
        matches!(
            self,
            SearchMode::Upper
                | SearchMode::UpperInclusive
                | SearchMode::Lower
                | SearchMode::LowerInclusive
        )
    }
}

/// Scan the backend's keys with the given mode
///
/// `capacity` bounds the result (0 = unlimited, except for the edit modes
/// where it bounds the ranked output).
pub fn search_keys(
    backend: &dyn Backend,
    mode: SearchMode,
    pattern: &[u8],
    capacity: usize,
) -> Result<Vec<Vec<u8>>> {
    if mode.needs_order() && !backend.is_ordered() {
        return Err(HelixError::NotImplemented(
            "boundary search requires an ordered backend".to_string(),
        ));
    }

    match mode {
        SearchMode::Contain => Ok(filter_keys(backend, capacity, |k| contains(k, pattern))),
        SearchMode::Begin => Ok(filter_keys(backend, capacity, |k| k.starts_with(pattern))),
        SearchMode::End => Ok(filter_keys(backend, capacity, |k| k.ends_with(pattern))),
        SearchMode::Regex => {
            let expr = String::from_utf8_lossy(pattern);
            let re = Regex::new(&expr).map_err(|e| {
                HelixError::InvalidArgument(format!("bad regex pattern: {}", e))
            })?;
            Ok(filter_keys(backend, capacity, |k| re.is_match(k)))
        }
        SearchMode::Edit => Ok(rank_by_distance(backend, capacity, |k| {
            edit_distance_chars(k, pattern)
        })),
        SearchMode::EditBin => Ok(rank_by_distance(backend, capacity, |k| {
            edit_distance_bytes(k, pattern)
        })),
        SearchMode::ContainCase => {
            let pat = lower_ascii(pattern);
            Ok(filter_keys(backend, capacity, |k| {
                contains(&lower_ascii(k), &pat)
            }))
        }
        SearchMode::ContainWord => Ok(filter_keys(backend, capacity, |k| {
            contains_word(k, pattern)
        })),
        SearchMode::ContainCaseWord => {
            let pat = lower_ascii(pattern);
            Ok(filter_keys(backend, capacity, |k| {
                contains_word(&lower_ascii(k), &pat)
            }))
        }
        SearchMode::Upper => Ok(scan_upward(backend, pattern, false, capacity)),
        SearchMode::UpperInclusive => Ok(scan_upward(backend, pattern, true, capacity)),
        SearchMode::Lower => Ok(scan_downward(backend, pattern, false, capacity)),
        SearchMode::LowerInclusive => Ok(scan_downward(backend, pattern, true, capacity)),
    }
}

// =============================================================================
// Matching Helpers
// =============================================================================

/// Collect keys satisfying a predicate, in traversal order
fn filter_keys(
    backend: &dyn Backend,
    capacity: usize,
    mut pred: impl FnMut(&[u8]) -> bool,
) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    backend.each(&mut |key, _value| {
        if pred(key) {
            out.push(key.to_vec());
        }
        capacity == 0 || out.len() < capacity
    });
    out
}

/// Substring containment over bytes
fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    if needle.len() > haystack.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Substring containment where the match is delimited by non-word bytes
fn contains_word(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    if needle.len() > haystack.len() {
        return false;
    }
    let is_word = |b: u8| b.is_ascii_alphanumeric() || b == b'_';
    for start in 0..=(haystack.len() - needle.len()) {
        if &haystack[start..start + needle.len()] != needle {
            continue;
        }
        let left_ok = start == 0 || !is_word(haystack[start - 1]);
        let end = start + needle.len();
        let right_ok = end == haystack.len() || !is_word(haystack[end]);
        if left_ok && right_ok {
            return true;
        }
    }
    false
}

/// ASCII-lowercase a byte string
fn lower_ascii(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().map(|b| b.to_ascii_lowercase()).collect()
}

/// Rank all keys by a distance function, closest first
///
/// Ties break on the key bytes so the ranking is deterministic.
fn rank_by_distance(
    backend: &dyn Backend,
    capacity: usize,
    mut distance: impl FnMut(&[u8]) -> usize,
) -> Vec<Vec<u8>> {
    let mut ranked: Vec<(usize, Vec<u8>)> = Vec::new();
    backend.each(&mut |key, _value| {
        ranked.push((distance(key), key.to_vec()));
        true
    });
    ranked.sort();
    let take = if capacity == 0 { ranked.len() } else { capacity };
    ranked.into_iter().take(take).map(|(_, k)| k).collect()
}

/// Levenshtein distance over UTF-8 characters (lossy for non-UTF-8 keys)
fn edit_distance_chars(a: &[u8], b: &[u8]) -> usize {
    let a: Vec<char> = String::from_utf8_lossy(a).chars().collect();
    let b: Vec<char> = String::from_utf8_lossy(b).chars().collect();
    levenshtein(&a, &b)
}

/// Levenshtein distance over raw bytes
fn edit_distance_bytes(a: &[u8], b: &[u8]) -> usize {
    levenshtein(a, b)
}

/// Classic two-row Levenshtein
fn levenshtein<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

// =============================================================================
// Boundary Scans (ordered backends)
// =============================================================================

/// Keys above the pattern, ascending
fn scan_upward(
    backend: &dyn Backend,
    pattern: &[u8],
    inclusive: bool,
    capacity: usize,
) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    let mut cursor = backend.seek_upper(pattern, inclusive);
    while let Some(key) = cursor {
        out.push(key.clone());
        if capacity != 0 && out.len() >= capacity {
            break;
        }
        cursor = backend.seek_upper(&key, false);
    }
    out
}

/// Keys below the pattern, descending
fn scan_downward(
    backend: &dyn Backend,
    pattern: &[u8],
    inclusive: bool,
    capacity: usize,
) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    let mut cursor = backend.seek_lower(pattern, inclusive);
    while let Some(key) = cursor {
        out.push(key.clone());
        if capacity != 0 && out.len() >= capacity {
            break;
        }
        cursor = backend.seek_lower(&key, false);
    }
    out
}
