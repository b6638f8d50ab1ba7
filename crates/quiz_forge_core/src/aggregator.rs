//! crates/quiz_forge_core/src/aggregator.rs
//!
//! Merges per-chunk questions into the final, bounded question set.

use tracing::{info, warn};

use crate::domain::Question;
use crate::settings::questions_per_chunk;

/// Returned when no question survived validation across the whole batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no valid questions generated")]
pub struct NoQuestions;

/// Largest number of questions kept for a batch of `num_chunks` chunks.
pub fn question_cap(num_chunks: usize, requested_per_chunk: usize) -> usize {
    questions_per_chunk(requested_per_chunk) * num_chunks
}

/// Concatenates questions in chunk order and truncates to the batch cap.
pub fn aggregate(
    per_chunk: Vec<Vec<Question>>,
    num_chunks: usize,
    requested_per_chunk: usize,
) -> Result<Vec<Question>, NoQuestions> {
    let cap = question_cap(num_chunks, requested_per_chunk);
    let mut questions: Vec<Question> = per_chunk.into_iter().flatten().collect();
    let produced = questions.len();

    if produced > cap {
        warn!(produced, cap, "Generator over-produced; truncating question set");
        questions.truncate(cap);
    }

    if questions.is_empty() {
        return Err(NoQuestions);
    }

    info!(kept = questions.len(), produced, num_chunks, "Aggregated question set");
    Ok(questions)
}
