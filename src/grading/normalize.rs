//! Cheap local comparison of an attempt against its target.

use std::sync::LazyLock;

use regex::Regex;

/// Unicode punctuation and whitespace. Combining marks are not in either class.
static PUNCTUATION_OR_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{P}\p{Z}\s]+").expect("Invalid punctuation regex"));

/// Lowercases and drops punctuation and whitespace.
///
/// Works on any script; `"Ça va?"` and `"ça  va"` normalize alike. Tone marks,
/// viramas and other combining marks are kept, since they change the word.
pub fn normalize(text: &str) -> String {
    PUNCTUATION_OR_SPACE
        .replace_all(text, "")
        .chars()
        .flat_map(char::to_lowercase)
        .collect()
}

/// True when the two texts are equal after normalization.
pub fn is_exact_match(attempt: &str, target: &str) -> bool {
    let attempt = normalize(attempt);
    !attempt.is_empty() && attempt == normalize(target)
}
