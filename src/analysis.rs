//! Text normalization and tokenization.
//!
//! The same tokenizer is used for indexing file bodies and for splitting
//! client query strings, so any word that can be indexed can be queried
//! bit-identically.

/// Lower-case a string using the full Unicode case mapping.
pub fn to_lower(text: &str) -> String {
    text.to_lowercase()
}

/// Upper-case a string using the full Unicode case mapping.
pub fn to_upper(text: &str) -> String {
    text.to_uppercase()
}

/// Split `content` into lower-cased words.
///
/// A word is a maximal run of alphanumeric characters; everything else is a
/// separator and is discarded. A run still open at end of input is emitted.
pub fn tokenize(content: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();

    for ch in content.chars() {
        if ch.is_alphanumeric() {
            current.extend(ch.to_lowercase());
        } else if !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
    }

    if !current.is_empty() {
        words.push(current);
    }

    words
}
