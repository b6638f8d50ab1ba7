//! crates/quiz_forge_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete document store, completion backend and HTTP client.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::{AttemptWrite, Exam, Question, QuizAttempt, QuizWrite};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Document Store
//=========================================================================================

#[async_trait]
pub trait DocumentStore: Send + Sync {
    // --- Exams ---
    async fn find_exam_by_title(&self, title: &str) -> PortResult<Option<Exam>>;

    async fn find_exam_by_id(&self, exam_id: Uuid) -> PortResult<Option<Exam>>;

    // --- Quiz Content ---
    /// Appends `questions` to the exam's quiz named `title`, appending a new quiz
    /// at the next index when the exam has none by that name. Resolving the title
    /// and writing happen as one atomic step, so concurrent callers with the same
    /// title always land in a single quiz.
    async fn append_to_quiz_titled(
        &self,
        exam_id: Uuid,
        title: &str,
        questions: &[Question],
    ) -> PortResult<QuizWrite>;

    /// Returns `PortError::NotFound` when the exam or quiz does not exist.
    async fn find_quiz_questions(&self, exam_id: Uuid, quiz_index: usize)
        -> PortResult<Vec<Question>>;

    // --- Attempts ---
    /// Creates the attempt history on first write and appends on later writes.
    async fn upsert_quiz_attempt(
        &self,
        user_id: Uuid,
        exam_id: Uuid,
        quiz_index: usize,
        attempt: QuizAttempt,
    ) -> PortResult<AttemptWrite>;

    /// Oldest first.
    async fn find_quiz_attempts(
        &self,
        user_id: Uuid,
        exam_id: Uuid,
        quiz_index: usize,
    ) -> PortResult<Vec<QuizAttempt>>;
}

//=========================================================================================
// Text Completion
//=========================================================================================

/// Which model variant a provider should use for a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    Standard,
    /// Cheaper, faster variant used for the simplified retry.
    Fast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionOptions {
    pub tier: ModelTier,
    pub response_format: ResponseFormat,
}

#[async_trait]
pub trait TextCompletionService: Send + Sync {
    /// Sends a single prompt and returns the model's text output.
    async fn complete(&self, prompt: &str, options: CompletionOptions) -> PortResult<String>;
}

//=========================================================================================
// HTTP Fetch
//=========================================================================================

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub timeout: Duration,
    pub max_bytes: usize,
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub content_type: Option<String>,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Response exceeds {limit} bytes")]
    TooLarge { limit: usize },
    #[error("Unexpected HTTP status {0}")]
    Status(u16),
    #[error("Transport error: {0}")]
    Transport(String),
}

#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn get(&self, url: &str, options: &FetchOptions) -> Result<FetchedPage, FetchError>;
}
