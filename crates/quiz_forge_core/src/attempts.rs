//! crates/quiz_forge_core/src/attempts.rs
//!
//! The "submit quiz attempt" operation: load the canonical questions, grade,
//! and append the result to the (user, exam, quiz) attempt history.

use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::domain::{AttemptWrite, GradeResult, QuizAttempt, UserAnswer};
use crate::grading::grade;
use crate::ports::{DocumentStore, PortError};

#[derive(Debug, Clone)]
pub struct SubmitAttempt {
    pub user_id: Uuid,
    pub exam_id: Uuid,
    pub quiz_index: usize,
    pub answers: Vec<UserAnswer>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptReceipt {
    pub result: GradeResult,
    pub write: AttemptWrite,
    pub attempt: QuizAttempt,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("quiz {quiz_index} of exam {exam_id} not found")]
    QuizNotFound { exam_id: Uuid, quiz_index: usize },
    #[error("document store error: {0}")]
    Store(#[from] PortError),
}

pub struct AttemptService {
    store: Arc<dyn DocumentStore>,
}

impl AttemptService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Grades a submission and records it. Every call appends one attempt.
    pub async fn submit(&self, submission: SubmitAttempt) -> Result<AttemptReceipt, SubmissionError> {
        let SubmitAttempt {
            user_id,
            exam_id,
            quiz_index,
            answers,
        } = submission;

        let questions = self
            .store
            .find_quiz_questions(exam_id, quiz_index)
            .await
            .map_err(|e| match e {
                PortError::NotFound(_) => SubmissionError::QuizNotFound { exam_id, quiz_index },
                other => SubmissionError::Store(other),
            })?;

        let result = grade(&questions, &answers);
        let attempt = QuizAttempt {
            user_id,
            exam_id,
            quiz_index,
            correct_answers: result.correct_answers,
            total_questions: result.total_questions,
            date: Utc::now(),
        };

        let write = self
            .store
            .upsert_quiz_attempt(user_id, exam_id, quiz_index, attempt.clone())
            .await?;

        info!(
            %user_id,
            %exam_id,
            quiz_index,
            correct = result.correct_answers,
            total = result.total_questions,
            ?write,
            "Recorded quiz attempt"
        );

        Ok(AttemptReceipt {
            result,
            write,
            attempt,
        })
    }

    /// The attempt history for one (user, exam, quiz), oldest first.
    pub async fn history(
        &self,
        user_id: Uuid,
        exam_id: Uuid,
        quiz_index: usize,
    ) -> Result<Vec<QuizAttempt>, SubmissionError> {
        Ok(self
            .store
            .find_quiz_attempts(user_id, exam_id, quiz_index)
            .await?)
    }
}
