//! crates/quiz_forge_core/src/validator.rs
//!
//! Turns raw generator output into validated `Question`s.
//!
//! The validator is the only place that decides whether generated content is
//! well-formed. Unparseable output contributes zero questions; individual
//! candidates that break a shape rule are dropped without affecting siblings.

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::{AnswerOption, Question, QuestionKind, RawGenerationResult};

/// Options required for a multiple-choice question.
pub const MULTIPLE_CHOICE_OPTIONS: usize = 4;

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*```[A-Za-z]*\s*(.*?)\s*```\s*$").expect("code fence pattern is valid")
});

//=========================================================================================
// Candidate Shapes (as produced by the generator)
//=========================================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CandidateQuestion {
    #[serde(alias = "text")]
    question: String,
    #[serde(rename = "type", default)]
    kind: Option<QuestionKind>,
    #[serde(default)]
    options: Option<Vec<CandidateOption>>,
    #[serde(default, alias = "answer", alias = "answer_key")]
    answer_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateOption {
    text: String,
    #[serde(alias = "isCorrect", alias = "is_correct")]
    correct: bool,
}

/// Why a single candidate was dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("candidate does not match the question shape: {0}")]
    Malformed(String),
    #[error("question text is empty")]
    EmptyText,
    #[error("{kind} question has no options")]
    MissingOptions { kind: QuestionKind },
    #[error("{kind} question has {found} options, expected {expected}")]
    WrongOptionCount {
        kind: QuestionKind,
        found: usize,
        expected: usize,
    },
    #[error("{kind} question has {found} correct options, expected exactly 1")]
    WrongCorrectCount { kind: QuestionKind, found: usize },
    #[error("option text is empty")]
    EmptyOption,
    #[error("true-false options must be exactly \"True\" and \"False\"")]
    NotTrueFalse,
    #[error("short-answer question must not carry options")]
    UnexpectedOptions,
    #[error("short-answer question has no answer key")]
    MissingAnswerKey,
    #[error("{found} question does not match the requested {expected} kind")]
    WrongKind {
        expected: QuestionKind,
        found: QuestionKind,
    },
}

//=========================================================================================
// Public API
//=========================================================================================

/// Validates raw output as multiple-choice questions.
pub fn validate(raw: &RawGenerationResult) -> Vec<Question> {
    validate_as(raw, QuestionKind::MultipleChoice)
}

/// Validates raw output, keeping only candidates of the requested `kind`.
/// Candidates without a `type` are checked as `kind`.
pub fn validate_as(raw: &RawGenerationResult, kind: QuestionKind) -> Vec<Question> {
    let Some(candidates) = parse_candidates(&raw.text) else {
        return Vec::new();
    };

    let total = candidates.len();
    let questions: Vec<Question> = candidates
        .into_iter()
        .enumerate()
        .filter_map(|(i, candidate)| match check_candidate(candidate, kind) {
            Ok(question) => Some(question),
            Err(rejection) => {
                debug!(candidate = i, %rejection, "Dropping generated question");
                None
            }
        })
        .collect();

    if questions.len() < total {
        debug!(kept = questions.len(), total, "Validation dropped some candidates");
    }
    questions
}

/// Extracts the JSON payload, removing a surrounding Markdown code fence if present.
pub fn strip_code_fence(text: &str) -> &str {
    match CODE_FENCE.captures(text).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => text.trim(),
    }
}

/// Returns `true` when the text parses as JSON once any code fence is removed.
pub fn is_parseable(text: &str) -> bool {
    serde_json::from_str::<Value>(strip_code_fence(text)).is_ok()
}

//=========================================================================================
// Internals
//=========================================================================================

fn parse_candidates(text: &str) -> Option<Vec<Value>> {
    let value: Value = match serde_json::from_str(strip_code_fence(text)) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Generator output is not valid JSON; chunk contributes no questions");
            return None;
        }
    };

    match value {
        Value::Array(items) => Some(items),
        Value::Object(mut map) => match map.remove("questions") {
            Some(Value::Array(items)) => Some(items),
            _ => {
                warn!("Generator output has no \"questions\" array");
                None
            }
        },
        _ => {
            warn!("Generator output is neither an object nor an array");
            None
        }
    }
}

fn check_candidate(value: Value, requested: QuestionKind) -> Result<Question, Rejection> {
    let candidate: CandidateQuestion =
        serde_json::from_value(value).map_err(|e| Rejection::Malformed(e.to_string()))?;

    if candidate.question.trim().is_empty() {
        return Err(Rejection::EmptyText);
    }

    let kind = candidate.kind.unwrap_or(requested);
    if kind != requested {
        return Err(Rejection::WrongKind {
            expected: requested,
            found: kind,
        });
    }
    let (options, answer_key) = match kind {
        QuestionKind::MultipleChoice => {
            let options = require_options(kind, candidate.options)?;
            check_option_count(kind, &options, MULTIPLE_CHOICE_OPTIONS)?;
            check_single_correct(kind, &options)?;
            (options, None)
        }
        QuestionKind::TrueFalse => {
            let options = require_options(kind, candidate.options)?;
            check_option_count(kind, &options, 2)?;
            let mut labels: Vec<&str> = options.iter().map(|o| o.text.as_str()).collect();
            labels.sort_unstable();
            if labels != ["False", "True"] {
                return Err(Rejection::NotTrueFalse);
            }
            check_single_correct(kind, &options)?;
            (options, None)
        }
        QuestionKind::ShortAnswer => {
            if candidate.options.is_some_and(|o| !o.is_empty()) {
                return Err(Rejection::UnexpectedOptions);
            }
            let key = candidate
                .answer_key
                .filter(|k| !k.trim().is_empty())
                .ok_or(Rejection::MissingAnswerKey)?;
            (Vec::new(), Some(key))
        }
    };

    Ok(Question {
        id: Uuid::new_v4().to_string(),
        text: candidate.question,
        kind,
        options,
        answer_key,
    })
}

fn require_options(
    kind: QuestionKind,
    options: Option<Vec<CandidateOption>>,
) -> Result<Vec<AnswerOption>, Rejection> {
    let options = options
        .filter(|o| !o.is_empty())
        .ok_or(Rejection::MissingOptions { kind })?;
    if options.iter().any(|o| o.text.trim().is_empty()) {
        return Err(Rejection::EmptyOption);
    }
    Ok(options
        .into_iter()
        .map(|o| AnswerOption {
            text: o.text,
            correct: o.correct,
        })
        .collect())
}

fn check_option_count(
    kind: QuestionKind,
    options: &[AnswerOption],
    expected: usize,
) -> Result<(), Rejection> {
    if options.len() != expected {
        return Err(Rejection::WrongOptionCount {
            kind,
            found: options.len(),
            expected,
        });
    }
    Ok(())
}

fn check_single_correct(kind: QuestionKind, options: &[AnswerOption]) -> Result<(), Rejection> {
    let found = options.iter().filter(|o| o.correct).count();
    if found != 1 {
        return Err(Rejection::WrongCorrectCount { kind, found });
    }
    Ok(())
}
