//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DocumentStore` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.
//!
//! Question sets and attempt histories are JSONB arrays. Every mutation is a
//! single append (`||`) so concurrent writers never overwrite each other.

use async_trait::async_trait;
use quiz_forge_core::domain::{AttemptWrite, Exam, Question, Quiz, QuizAttempt, QuizWrite};
use quiz_forge_core::ports::{DocumentStore, PortError, PortResult};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::debug;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DocumentStore` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn load_exam(&self, record: ExamRecord) -> PortResult<Exam> {
        let quizzes = sqlx::query_as::<_, QuizRecord>(
            "SELECT title, questions FROM quizzes WHERE exam_id = $1 ORDER BY quiz_index ASC",
        )
        .bind(record.id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.to_domain(quizzes.into_iter().map(QuizRecord::to_domain).collect()))
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ExamRecord {
    id: Uuid,
    title: String,
}
impl ExamRecord {
    fn to_domain(self, quizzes: Vec<Quiz>) -> Exam {
        Exam {
            id: self.id,
            title: self.title,
            quizzes,
        }
    }
}

#[derive(FromRow)]
struct QuizRecord {
    title: String,
    questions: Json<Vec<Question>>,
}
impl QuizRecord {
    fn to_domain(self) -> Quiz {
        Quiz {
            title: self.title,
            questions: self.questions.0,
        }
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn db_index(quiz_index: usize) -> PortResult<i32> {
    i32::try_from(quiz_index)
        .map_err(|_| PortError::InvalidInput(format!("quiz index {} is out of range", quiz_index)))
}

//=========================================================================================
// `DocumentStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl DocumentStore for DbAdapter {
    async fn find_exam_by_title(&self, title: &str) -> PortResult<Option<Exam>> {
        let record = sqlx::query_as::<_, ExamRecord>("SELECT id, title FROM exams WHERE title = $1")
            .bind(title)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;

        match record {
            Some(record) => Ok(Some(self.load_exam(record).await?)),
            None => Ok(None),
        }
    }

    async fn find_exam_by_id(&self, exam_id: Uuid) -> PortResult<Option<Exam>> {
        let record = sqlx::query_as::<_, ExamRecord>("SELECT id, title FROM exams WHERE id = $1")
            .bind(exam_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;

        match record {
            Some(record) => Ok(Some(self.load_exam(record).await?)),
            None => Ok(None),
        }
    }

    async fn append_to_quiz_titled(
        &self,
        exam_id: Uuid,
        title: &str,
        questions: &[Question],
    ) -> PortResult<QuizWrite> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        // Locking the exam row serializes title resolution and index assignment.
        sqlx::query("SELECT id FROM exams WHERE id = $1 FOR UPDATE")
            .bind(exam_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("Exam {} not found", exam_id)))?;

        let existing: Option<(i32,)> = sqlx::query_as(
            "UPDATE quizzes SET questions = questions || $3 WHERE exam_id = $1 AND title = $2 \
             RETURNING quiz_index",
        )
        .bind(exam_id)
        .bind(title)
        .bind(Json(questions))
        .fetch_optional(&mut *tx)
        .await
        .map_err(unexpected)?;

        let (quiz_index, created) = match existing {
            Some((quiz_index,)) => (quiz_index, false),
            None => {
                let (quiz_index,): (i32,) = sqlx::query_as(
                    "INSERT INTO quizzes (exam_id, quiz_index, title, questions) \
                     SELECT $1, COALESCE(MAX(quiz_index) + 1, 0), $2, $3 FROM quizzes WHERE exam_id = $1 \
                     RETURNING quiz_index",
                )
                .bind(exam_id)
                .bind(title)
                .bind(Json(questions))
                .fetch_one(&mut *tx)
                .await
                .map_err(unexpected)?;
                (quiz_index, true)
            }
        };

        tx.commit().await.map_err(unexpected)?;

        debug!(%exam_id, quiz_index, created, "Stored generated questions");
        Ok(QuizWrite {
            quiz_index: usize::try_from(quiz_index).map_err(|e| PortError::Unexpected(e.to_string()))?,
            created,
        })
    }

    async fn find_quiz_questions(&self, exam_id: Uuid, quiz_index: usize) -> PortResult<Vec<Question>> {
        let row: Option<(Json<Vec<Question>>,)> = sqlx::query_as(
            "SELECT questions FROM quizzes WHERE exam_id = $1 AND quiz_index = $2",
        )
        .bind(exam_id)
        .bind(db_index(quiz_index)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        row.map(|(questions,)| questions.0).ok_or_else(|| {
            PortError::NotFound(format!("Quiz {} of exam {} not found", quiz_index, exam_id))
        })
    }

    async fn upsert_quiz_attempt(
        &self,
        user_id: Uuid,
        exam_id: Uuid,
        quiz_index: usize,
        attempt: QuizAttempt,
    ) -> PortResult<AttemptWrite> {
        // `xmax = 0` holds only for a freshly inserted row.
        let (inserted,): (bool,) = sqlx::query_as(
            "INSERT INTO quiz_attempts (user_id, exam_id, quiz_index, history) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (user_id, exam_id, quiz_index) \
             DO UPDATE SET history = quiz_attempts.history || EXCLUDED.history, updated_at = now() \
             RETURNING (xmax = 0) AS inserted",
        )
        .bind(user_id)
        .bind(exam_id)
        .bind(db_index(quiz_index)?)
        .bind(Json(vec![attempt]))
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(if inserted {
            AttemptWrite::Created
        } else {
            AttemptWrite::Appended
        })
    }

    async fn find_quiz_attempts(
        &self,
        user_id: Uuid,
        exam_id: Uuid,
        quiz_index: usize,
    ) -> PortResult<Vec<QuizAttempt>> {
        let row: Option<(Json<Vec<QuizAttempt>>,)> = sqlx::query_as(
            "SELECT history FROM quiz_attempts WHERE user_id = $1 AND exam_id = $2 AND quiz_index = $3",
        )
        .bind(user_id)
        .bind(exam_id)
        .bind(db_index(quiz_index)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(row.map(|(history,)| history.0).unwrap_or_default())
    }
}
