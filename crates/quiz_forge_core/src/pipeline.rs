//! crates/quiz_forge_core/src/pipeline.rs
//!
//! The "generate from sources" operation: Extractor -> Chunker -> Generator
//! (fan-out per chunk, fan-in) -> Validator -> Aggregator -> document store.
//!
//! Per-source and per-chunk failures are absorbed by their components. Only
//! the batch-fatal conditions in `GenerationError` reach the caller, and none
//! of them leaves anything persisted.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::aggregator::aggregate;
use crate::chunker::chunk_source;
use crate::domain::{
    ContentChunk, GenerationRequest, ProviderKind, Question, QuestionKind, SourceUnit,
};
use crate::extractor::ContentExtractor;
use crate::generator::{ProviderRegistry, QuestionGenerator};
use crate::ports::{DocumentStore, HttpFetcher, PortError};
use crate::settings::{questions_per_chunk, PipelineSettings, NUM_QUESTIONS_RANGE};
use crate::validator::validate_as;

//=========================================================================================
// Request, Summary and Error Types
//=========================================================================================

#[derive(Debug, Clone)]
pub struct GenerateFromSources {
    pub sources: Vec<SourceUnit>,
    pub num_questions: usize,
    pub quiz_title: String,
    pub exam_title: String,
    pub language: String,
    pub kind: QuestionKind,
    pub provider: Option<ProviderKind>,
}

/// What a successful generation request persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationSummary {
    pub exam_id: Uuid,
    pub quiz_index: usize,
    pub inserted_count: usize,
    /// `true` when a new quiz was appended, `false` when questions joined an existing one.
    pub created_quiz: bool,
    pub sources_used: usize,
    pub chunk_count: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("exam not found: {0}")]
    ExamNotFound(String),
    #[error("no valid content extracted")]
    NoValidContent,
    #[error("no valid questions generated")]
    NoValidQuestions,
    #[error("document store error: {0}")]
    Store(#[from] PortError),
}

//=========================================================================================
// The Pipeline
//=========================================================================================

pub struct QuizPipeline {
    store: Arc<dyn DocumentStore>,
    extractor: ContentExtractor,
    generator: QuestionGenerator,
    settings: PipelineSettings,
}

impl QuizPipeline {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        fetcher: Arc<dyn HttpFetcher>,
        providers: ProviderRegistry,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            extractor: ContentExtractor::new(fetcher, settings.clone()),
            generator: QuestionGenerator::new(providers),
            settings,
        }
    }

    pub async fn generate_from_sources(
        &self,
        request: GenerateFromSources,
    ) -> Result<GenerationSummary, GenerationError> {
        validate_request(&request)?;

        let exam = self
            .store
            .find_exam_by_title(&request.exam_title)
            .await?
            .ok_or_else(|| GenerationError::ExamNotFound(request.exam_title.clone()))?;

        let extracted = self
            .extractor
            .extract_batch(request.sources)
            .await
            .map_err(|e| GenerationError::InvalidRequest(e.to_string()))?;
        if extracted.is_empty() {
            return Err(GenerationError::NoValidContent);
        }

        let mut chunks: Vec<ContentChunk> = Vec::new();
        for source in &extracted {
            let next = chunk_source(
                &source.text,
                self.settings.chunk_max_tokens,
                &source.source_id,
                chunks.len(),
            );
            chunks.extend(next);
        }
        if chunks.is_empty() {
            return Err(GenerationError::NoValidContent);
        }

        let chunk_count = chunks.len();
        info!(
            exam = %exam.title,
            sources = extracted.len(),
            chunks = chunk_count,
            "Generating questions"
        );

        let per_chunk = self
            .generate_for_chunks(
                chunks,
                request.num_questions,
                &request.language,
                request.kind,
                request.provider,
            )
            .await;

        let questions = aggregate(per_chunk, chunk_count, request.num_questions)
            .map_err(|_| GenerationError::NoValidQuestions)?;
        let inserted_count = questions.len();

        let write = self
            .store
            .append_to_quiz_titled(exam.id, &request.quiz_title, &questions)
            .await?;
        let (quiz_index, created_quiz) = (write.quiz_index, write.created);

        info!(
            exam_id = %exam.id,
            quiz_index,
            inserted_count,
            created_quiz,
            "Persisted generated questions"
        );

        Ok(GenerationSummary {
            exam_id: exam.id,
            quiz_index,
            inserted_count,
            created_quiz,
            sources_used: extracted.len(),
            chunk_count,
        })
    }

    /// Runs every chunk through generation and validation concurrently,
    /// returning per-chunk questions in chunk order once all calls have settled.
    async fn generate_for_chunks(
        &self,
        chunks: Vec<ContentChunk>,
        num_questions: usize,
        language: &str,
        kind: QuestionKind,
        provider: Option<ProviderKind>,
    ) -> Vec<Vec<Question>> {
        let per_chunk_count = questions_per_chunk(num_questions);

        stream::iter(chunks)
            .map(|chunk| {
                let request = GenerationRequest {
                    chunk,
                    num_questions: per_chunk_count,
                    language: language.to_string(),
                    kind,
                    provider,
                };
                async move {
                    let outcome = self.generator.generate(&request).await;
                    if outcome.is_empty() {
                        warn!(chunk = request.chunk.index, "Chunk degraded to an empty contribution");
                    }
                    validate_as(&outcome.into_raw(), kind)
                }
            })
            .buffered(self.settings.generation_concurrency.max(1))
            .collect()
            .await
    }
}

fn validate_request(request: &GenerateFromSources) -> Result<(), GenerationError> {
    if !NUM_QUESTIONS_RANGE.contains(&request.num_questions) {
        return Err(GenerationError::InvalidRequest(format!(
            "numQuestions must be between {} and {}",
            NUM_QUESTIONS_RANGE.start(),
            NUM_QUESTIONS_RANGE.end()
        )));
    }
    if request.quiz_title.trim().is_empty() {
        return Err(GenerationError::InvalidRequest("quizTitle is required".to_string()));
    }
    if request.exam_title.trim().is_empty() {
        return Err(GenerationError::InvalidRequest("examTitle is required".to_string()));
    }
    if request.language.trim().is_empty() {
        return Err(GenerationError::InvalidRequest("language is required".to_string()));
    }
    if request.sources.is_empty() {
        return Err(GenerationError::InvalidRequest(
            "at least one source URL or an uploaded file is required".to_string(),
        ));
    }
    Ok(())
}
