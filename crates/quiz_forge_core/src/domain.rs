//! crates/quiz_forge_core/src/domain.rs
//!
//! Defines the core data structures for quiz generation and grading.
//! Questions, quizzes and attempts are serde-friendly because they are stored
//! as JSON documents; the pipeline-internal types are plain structs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

//=========================================================================================
// Source Material
//=========================================================================================

/// Where a unit of source material came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOrigin {
    /// A page to be fetched over HTTP.
    Url(String),
    /// Raw bytes uploaded by the caller, with the client-supplied file name.
    Upload { file_name: String, bytes: Vec<u8> },
}

/// One crawlable URL or one uploaded file contributing text to a generation batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    pub origin: SourceOrigin,
}

impl SourceUnit {
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            origin: SourceOrigin::Url(url.into()),
        }
    }

    pub fn upload(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            origin: SourceOrigin::Upload {
                file_name: file_name.into(),
                bytes,
            },
        }
    }

    /// A human-readable identifier used in logs and chunk provenance.
    pub fn identifier(&self) -> &str {
        match &self.origin {
            SourceOrigin::Url(url) => url,
            SourceOrigin::Upload { file_name, .. } => file_name,
        }
    }
}

/// Normalized plain text derived from a `SourceUnit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub source_id: String,
    pub text: String,
}

impl ExtractedText {
    /// Length in characters, not bytes.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A contiguous, whitespace-bounded slice of extracted text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentChunk {
    pub index: usize,
    pub text: String,
    pub source_id: Option<String>,
}

//=========================================================================================
// Generation
//=========================================================================================

/// The shape of question a generation request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionKind {
    #[default]
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            QuestionKind::MultipleChoice => "multiple-choice",
            QuestionKind::TrueFalse => "true-false",
            QuestionKind::ShortAnswer => "short-answer",
        };
        f.write_str(label)
    }
}

/// Identifies one of the interchangeable text-completion backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Gemini,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::OpenAi => f.write_str("openai"),
            ProviderKind::Gemini => f.write_str("gemini"),
        }
    }
}

/// Everything needed to ask the generator for questions about one chunk.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub chunk: ContentChunk,
    pub num_questions: usize,
    pub language: String,
    pub kind: QuestionKind,
    pub provider: Option<ProviderKind>,
}

/// The generator's textual response for one request. Expected to hold a JSON
/// question container but not guaranteed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawGenerationResult {
    pub text: String,
}

impl RawGenerationResult {
    /// The `{ "questions": [] }` container a degraded chunk contributes.
    pub fn empty() -> Self {
        Self {
            text: r#"{"questions":[]}"#.to_string(),
        }
    }
}

//=========================================================================================
// Quiz Content
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub text: String,
    pub correct: bool,
}

/// A validated question. Only the validator constructs these from generator output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    #[serde(default)]
    pub options: Vec<AnswerOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_key: Option<String>,
}

impl Question {
    /// The text of the option flagged correct, for choice-based questions.
    pub fn correct_option(&self) -> Option<&AnswerOption> {
        self.options.iter().find(|o| o.correct)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    pub title: String,
    pub questions: Vec<Question>,
}

/// An exam and the quizzes appended to it, in index order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exam {
    pub id: Uuid,
    pub title: String,
    pub quizzes: Vec<Quiz>,
}

impl Exam {
    /// Position of the quiz with the given title, if the exam already has one.
    pub fn quiz_index_by_title(&self, title: &str) -> Option<usize> {
        self.quizzes.iter().position(|q| q.title == title)
    }
}

/// Where a batch of generated questions was stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizWrite {
    pub quiz_index: usize,
    /// `true` when no quiz had the title and a new one was appended to the exam.
    pub created: bool,
}

//=========================================================================================
// Grading
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAnswer {
    pub question_id: String,
    pub submitted_answer: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeResult {
    pub correct_answers: usize,
    pub total_questions: usize,
}

/// One graded submission, appended to the (user, exam, quiz) history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttempt {
    pub user_id: Uuid,
    pub exam_id: Uuid,
    pub quiz_index: usize,
    pub correct_answers: usize,
    pub total_questions: usize,
    pub date: DateTime<Utc>,
}

/// Whether an attempt write created the history record or appended to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptWrite {
    Created,
    Appended,
}
