//! Hard length enforcement: trim an utterance to a word cap at the last
//! sentence boundary within the cap, falling back to a word-boundary trim
//! with an ellipsis.

const SENTENCE_ENDERS: &[char] = &['.', '!', '?'];

/// Trim `text` to at most `word_cap` words, preferring to cut at the last
/// sentence boundary that still fits; if no sentence boundary exists within
/// the cap, cut at the nearest word boundary and append an ellipsis.
pub fn enforce_word_cap(text: &str, word_cap: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= word_cap {
        return text.trim().to_string();
    }

    let capped = words[..word_cap].join(" ");

    if let Some(boundary) = last_sentence_boundary(&capped) {
        return capped[..=boundary].to_string();
    }

    format!("{capped}...")
}

fn last_sentence_boundary(text: &str) -> Option<usize> {
    text.char_indices()
        .filter(|(_, ch)| SENTENCE_ENDERS.contains(ch))
        .map(|(i, _)| i)
        .last()
}
