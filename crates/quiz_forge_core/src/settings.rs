//! crates/quiz_forge_core/src/settings.rs
//!
//! Numeric limits that bound the generation pipeline.

use std::ops::RangeInclusive;
use std::time::Duration;

/// Characters per token in the chunk-size heuristic.
pub const CHARS_PER_TOKEN: usize = 4;

/// Allowed values for the requested question count.
pub const NUM_QUESTIONS_RANGE: RangeInclusive<usize> = 1..=20;

/// Upper bound on questions requested from, and kept for, each chunk.
pub const MAX_QUESTIONS_PER_CHUNK: usize = 5;

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub chunk_max_tokens: usize,
    pub max_sources: usize,
    pub fetch_timeout: Duration,
    pub fetch_max_bytes: usize,
    pub max_extracted_chars: usize,
    pub min_extracted_chars: usize,
    pub user_agent: String,
    /// How many sources are fetched at once.
    pub extraction_concurrency: usize,
    /// How many chunk generation calls are in flight at once.
    pub generation_concurrency: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            chunk_max_tokens: 3000,
            max_sources: 50,
            fetch_timeout: Duration::from_secs(10),
            fetch_max_bytes: 2 * 1024 * 1024,
            max_extracted_chars: 50_000,
            min_extracted_chars: 50,
            user_agent: format!("quiz-forge/{} (Content Extractor)", env!("CARGO_PKG_VERSION")),
            extraction_concurrency: 8,
            generation_concurrency: 8,
        }
    }
}

impl PipelineSettings {
    pub fn chunk_max_chars(&self) -> usize {
        self.chunk_max_tokens * CHARS_PER_TOKEN
    }
}

/// Questions asked of each chunk for a requested count.
pub fn questions_per_chunk(num_questions: usize) -> usize {
    num_questions.min(MAX_QUESTIONS_PER_CHUNK)
}
