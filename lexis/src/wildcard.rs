//! Wildcard patterns: n-gram keys and glob matching
//!
//! Terms are indexed by the n-grams of their padded form `^term$`, so a
//! pattern such as `re*` can be answered from the `^re` entry and then
//! filtered with [`wildcard_match`].

use thiserror::Error;

pub const ANY_RUN: char = '*';
pub const ANY_ONE: char = '?';
pub const START_PAD: char = '^';
pub const END_PAD: char = '$';

/// Default n-gram width
pub const DEFAULT_NGRAM_WIDTH: usize = 3;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum WildcardError {
    #[error("Could not parse wildcard query '{0}': needs {1} consecutive literal characters")]
    PatternTooShort(String, usize),
}

pub fn is_wildcard(c: char) -> bool {
    c == ANY_RUN || c == ANY_ONE
}

pub fn has_wildcard(value: &str) -> bool {
    value.chars().any(is_wildcard)
}

fn padded(value: &str) -> Vec<char> {
    let mut chars = Vec::with_capacity(value.len() + 2);
    chars.push(START_PAD);
    chars.extend(value.chars());
    chars.push(END_PAD);
    chars
}

/// Single characters get no wildcard entries.
const MIN_INDEXED_CHARS: usize = 2;

/// Overlapping n-grams of `^term$`. Empty when the term has fewer than two
/// characters or its padded form is narrower than `width`.
pub fn ngrams(term: &str, width: usize) -> Vec<String> {
    if width == 0 || term.chars().count() < MIN_INDEXED_CHARS {
        return Vec::new();
    }
    let chars = padded(term);
    let mut grams: Vec<String> = chars.windows(width).map(|w| w.iter().collect()).collect();
    grams.dedup();
    grams
}

/// The n-gram used to look a pattern up: the leading n-gram of the longest
/// literal run in the padded pattern.
pub fn query_ngram(pattern: &str, width: usize) -> Result<String, WildcardError> {
    let chars = padded(pattern);
    let mut best: Option<(usize, usize)> = None;
    let mut start = 0;

    while start < chars.len() {
        if is_wildcard(chars[start]) {
            start += 1;
            continue;
        }
        let end = chars[start..]
            .iter()
            .position(|&c| is_wildcard(c))
            .map_or(chars.len(), |offset| start + offset);
        let len = end - start;
        if len >= width && best.map_or(true, |(_, best_len)| len > best_len) {
            best = Some((start, len));
        }
        start = end;
    }

    match best {
        Some((start, _)) => Ok(chars[start..start + width].iter().collect()),
        None => Err(WildcardError::PatternTooShort(pattern.to_string(), width)),
    }
}

/// Glob match: `*` matches any run (including empty), `?` exactly one character.
pub fn wildcard_match(text: &str, pattern: &str) -> bool {
    if pattern == "*" {
        return true;
    }

    let pattern: Vec<char> = pattern.chars().collect();
    let runs = pattern.iter().filter(|&&c| c == ANY_RUN).count();
    let singles = pattern.iter().filter(|&&c| c == ANY_ONE).count();

    if runs == 0 && singles == 0 {
        return text.chars().eq(pattern.iter().copied());
    }

    let text: Vec<char> = text.chars().collect();
    if runs == 0 && text.len() != pattern.len() {
        return false;
    }
    // Every non-star character consumes exactly one text character.
    if text.len() < pattern.len() - runs {
        return false;
    }
    if runs > 0 && pattern.len() - runs == singles {
        return true;
    }

    let n = pattern.len();
    let mut row = vec![false; n + 1];
    row[0] = true;
    for j in 1..=n {
        row[j] = row[j - 1] && pattern[j - 1] == ANY_RUN;
    }

    let mut previous = row.clone();
    for &c in &text {
        previous.copy_from_slice(&row);
        row[0] = false;
        for j in 1..=n {
            row[j] = match pattern[j - 1] {
                ANY_RUN => row[j - 1] || previous[j],
                ANY_ONE => previous[j - 1],
                literal => literal == c && previous[j - 1],
            };
        }
    }

    row[n]
}
