//! Token-set similarity used to suppress duplicate writes.

use std::collections::HashSet;

/// Jaccard similarity threshold above which a candidate counts as a duplicate.
pub const DUPLICATE_THRESHOLD: f64 = 0.9;

/// Candidates this short (in characters) only match exactly.
pub const FUZZY_MIN_CHARS: usize = 20;

/// Jaccard index of the whitespace token sets of `a` and `b`.
///
/// Two empty inputs are identical (1.0); exactly one empty input shares
/// nothing (0.0).
pub fn jaccard(a: &str, b: &str) -> f64 {
    let left: HashSet<&str> = a.split_whitespace().collect();
    let right: HashSet<&str> = b.split_whitespace().collect();

    match (left.is_empty(), right.is_empty()) {
        (true, true) => return 1.0,
        (true, false) | (false, true) => return 0.0,
        (false, false) => {}
    }

    let intersection = left.intersection(&right).count();
    let union = left.union(&right).count();
    intersection as f64 / union as f64
}

/// Whether `candidate` would duplicate `existing`.
///
/// Both sides are compared trimmed and lowercased: equal texts always match;
/// otherwise candidates longer than [`FUZZY_MIN_CHARS`] match when their
/// Jaccard similarity exceeds [`DUPLICATE_THRESHOLD`]. An empty candidate
/// never matches.
pub fn is_duplicate(candidate: &str, existing: &str) -> bool {
    let candidate = comparable(candidate);
    if candidate.is_empty() {
        return false;
    }
    let existing = comparable(existing);
    if candidate == existing {
        return true;
    }
    candidate.chars().count() > FUZZY_MIN_CHARS && jaccard(&candidate, &existing) > DUPLICATE_THRESHOLD
}

fn comparable(text: &str) -> String {
    text.trim().to_lowercase()
}
