//! Text to term conversion used before indexing and querying.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

const SPECIAL_CHARS: &str = "!\"#()%<>:;{}[]/\\|?.,'`´*¨°^±≈§∞$£@©€™~–…›‹¸˛";

fn is_special(c: char) -> bool {
    SPECIAL_CHARS.contains(c)
}

/// Fold a single token: decompose, drop combining marks, lowercase, trim.
/// `"Crème"` becomes `"creme"`.
pub fn normalize(term: &str) -> String {
    term.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
        .trim()
        .to_string()
}

/// Split `content` into normalized terms longer than `min_len` characters.
/// With `strip_special`, punctuation and query syntax characters act as separators.
pub fn tokenize(content: &str, min_len: usize, strip_special: bool) -> Vec<String> {
    let cleaned: String = if strip_special {
        content.chars().map(|c| if is_special(c) { ' ' } else { c }).collect()
    } else {
        content.to_string()
    };

    cleaned
        .split_whitespace()
        .map(normalize)
        .filter(|term| term.chars().count() > min_len)
        .collect()
}

/// Tokenize document text with the defaults: single characters dropped,
/// punctuation stripped.
pub fn tokenize_text(content: &str) -> Vec<String> {
    tokenize(content, 1, true)
}
