//! crates/quiz_forge_core/src/chunker.rs
//!
//! Splits normalized text into chunks that fit one generation call.
//!
//! Boundaries only ever fall on whitespace. Chunks are built greedily from
//! whitespace-delimited words joined by single spaces, so joining the chunks
//! with single spaces gives back the word sequence of the input.

use crate::domain::ContentChunk;
use crate::settings::CHARS_PER_TOKEN;

/// Chunks `text` so that each chunk holds at most `max_tokens * 4` characters.
///
/// A word longer than the limit is emitted as its own oversized chunk rather
/// than being cut. Empty or whitespace-only input yields no chunks.
pub fn chunk(text: &str, max_tokens: usize) -> Vec<ContentChunk> {
    chunk_words(text, max_tokens * CHARS_PER_TOKEN)
        .into_iter()
        .enumerate()
        .map(|(index, text)| ContentChunk {
            index,
            text,
            source_id: None,
        })
        .collect()
}

/// Chunks `text` and tags every chunk with its source, numbering from `first_index`.
pub fn chunk_source(
    text: &str,
    max_tokens: usize,
    source_id: &str,
    first_index: usize,
) -> Vec<ContentChunk> {
    chunk(text, max_tokens)
        .into_iter()
        .map(|c| ContentChunk {
            index: first_index + c.index,
            text: c.text,
            source_id: Some(source_id.to_string()),
        })
        .collect()
}

fn chunk_words(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut buffer = String::new();
    // Character count of `buffer`; `String::len` counts bytes.
    let mut buffer_chars = 0usize;

    for word in text.split_whitespace() {
        let word_chars = word.chars().count();

        if buffer.is_empty() {
            buffer.push_str(word);
            buffer_chars = word_chars;
            continue;
        }

        if buffer_chars + 1 + word_chars > max_chars {
            chunks.push(std::mem::take(&mut buffer));
            buffer.push_str(word);
            buffer_chars = word_chars;
        } else {
            buffer.push(' ');
            buffer.push_str(word);
            buffer_chars += 1 + word_chars;
        }
    }

    if !buffer.is_empty() {
        chunks.push(buffer);
    }

    chunks
}
