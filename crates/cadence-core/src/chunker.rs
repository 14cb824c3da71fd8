//! Human-like reply chunking: groups sentences into message bubbles.

use std::sync::LazyLock;

use regex_lite::Regex;

/// Sentence terminator run, optional closing quotes/brackets, then whitespace.
static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[.!?]+["')\]]*\s+"#).unwrap());

/// Sentences at most this long stand alone when nothing is buffered.
const SHORT_SENTENCE_WORDS: usize = 6;

/// Split `text` into trimmed, non-empty sentences.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut last = 0;
    for m in SENTENCE_END.find_iter(text) {
        let sentence = text[last..m.end()].trim();
        if !sentence.is_empty() {
            sentences.push(sentence.to_string());
        }
        last = m.end();
    }
    let tail = text[last..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}

/// Group sentences into chunks: short standalone sentences and a closing
/// question get their own bubble, everything else is paired up.
pub fn human_like_chunks(text: &str) -> Vec<String> {
    let sentences = split_sentences(text);
    let last_index = sentences.len().saturating_sub(1);
    let mut chunks = Vec::new();
    let mut buffer: Vec<String> = Vec::new();

    for (i, sentence) in sentences.into_iter().enumerate() {
        if sentence.split_whitespace().count() <= SHORT_SENTENCE_WORDS && buffer.is_empty() {
            chunks.push(sentence);
        } else if sentence.contains('?') && i == last_index {
            if !buffer.is_empty() {
                chunks.push(buffer.join(" "));
                buffer.clear();
            }
            chunks.push(sentence);
        } else {
            buffer.push(sentence);
            if buffer.len() >= 2 {
                chunks.push(buffer.join(" "));
                buffer.clear();
            }
        }
    }

    if !buffer.is_empty() {
        chunks.push(buffer.join(" "));
    }
    chunks
}
