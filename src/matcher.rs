use once_cell::sync::Lazy;
use regex::Regex;

/// Pairs at or above this ratio are reported as probable duplicates.
pub const SIMILAR_THRESHOLD: f64 = 0.80;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// Case-folded, trimmed label with inner whitespace runs collapsed.
pub fn fold(label: &str) -> String {
    WHITESPACE
        .replace_all(label.trim(), " ")
        .to_uppercase()
}

/// Ratcliff/Obershelp similarity of two labels after folding, in [0, 1].
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = fold(a).chars().collect();
    let b: Vec<char> = fold(b).chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let (i, j, len) = longest_common_block(a, b);
    if len == 0 {
        return 0;
    }
    len + matching_chars(&a[..i], &b[..j]) + matching_chars(&a[i + len..], &b[j + len..])
}

// Earliest longest common substring as (start in a, start in b, length).
fn longest_common_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut prev = vec![0usize; b.len() + 1];
    for i in 0..a.len() {
        let mut row = vec![0usize; b.len() + 1];
        for j in 0..b.len() {
            if a[i] == b[j] {
                row[j + 1] = prev[j] + 1;
                if row[j + 1] > best.2 {
                    best = (i + 1 - row[j + 1], j + 1 - row[j + 1], row[j + 1]);
                }
            }
        }
        prev = row;
    }
    best
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchBucket {
    /// Same label up to case and spacing; safe to normalize.
    Exact,
    /// Probably the same place; a human must verify.
    Similar,
    /// No plausible counterpart.
    New,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification<'a> {
    pub bucket: MatchBucket,
    pub candidate: Option<&'a str>,
    pub score: f64,
}

/// Classifies `label` against `candidates`. Never merges anything; the
/// caller only reports the outcome.
pub fn classify<'a, S: AsRef<str>>(label: &str, candidates: &'a [S]) -> Classification<'a> {
    let folded = fold(label);
    if let Some(exact) = candidates.iter().find(|c| fold(c.as_ref()) == folded) {
        return Classification {
            bucket: MatchBucket::Exact,
            candidate: Some(exact.as_ref()),
            score: 1.0,
        };
    }

    let mut best: Option<(&str, f64)> = None;
    for candidate in candidates {
        let score = similarity(label, candidate.as_ref());
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((candidate.as_ref(), score));
        }
    }

    match best {
        Some((candidate, score)) if score >= SIMILAR_THRESHOLD => Classification {
            bucket: MatchBucket::Similar,
            candidate: Some(candidate),
            score,
        },
        _ => Classification {
            bucket: MatchBucket::New,
            candidate: None,
            score: best.map_or(0.0, |(_, s)| s),
        },
    }
}
