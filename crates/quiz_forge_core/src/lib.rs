pub mod aggregator;
pub mod attempts;
pub mod chunker;
pub mod domain;
pub mod extractor;
pub mod generator;
pub mod grading;
pub mod pipeline;
pub mod ports;
pub mod settings;
pub mod validator;

pub use attempts::{AttemptReceipt, AttemptService, SubmissionError, SubmitAttempt};
pub use domain::{
    AnswerOption, AttemptWrite, ContentChunk, Exam, ExtractedText, GenerationRequest, GradeResult,
    ProviderKind, Question, QuestionKind, Quiz, QuizAttempt, QuizWrite, RawGenerationResult,
    SourceOrigin, SourceUnit, UserAnswer,
};
pub use generator::{GenerationOutcome, ProviderRegistry, QuestionGenerator};
pub use pipeline::{GenerateFromSources, GenerationError, GenerationSummary, QuizPipeline};
pub use ports::{
    CompletionOptions, DocumentStore, FetchError, FetchOptions, FetchedPage, HttpFetcher,
    ModelTier, PortError, PortResult, ResponseFormat, TextCompletionService,
};
pub use settings::PipelineSettings;
