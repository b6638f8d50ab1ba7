//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.
//!
//! Handlers stay thin: they translate payloads into core requests and map
//! core errors onto HTTP statuses.

use crate::web::state::AppState;
use axum::{
    extract::{Multipart, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use quiz_forge_core::{
    AttemptWrite, GenerateFromSources, GenerationError, GenerationSummary, ProviderKind,
    QuestionKind, QuizAttempt, SourceUnit, SubmissionError, SubmitAttempt, UserAnswer,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

const DEFAULT_LANGUAGE: &str = "English";

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        generate_quiz_handler,
        upload_quiz_handler,
        submit_attempt_handler,
        list_attempts_handler,
    ),
    components(
        schemas(
            GenerateQuizRequest,
            GenerateQuizResponse,
            SubmitAttemptRequest,
            AnswerPayload,
            SubmitAttemptResponse,
            AttemptHistoryEntry
        )
    ),
    tags(
        (name = "Quiz Forge API", description = "Generate quizzes from web pages or uploads and grade attempts.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The JSON payload for generating questions from web pages.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateQuizRequest {
    pub source_urls: Vec<String>,
    pub num_questions: usize,
    pub quiz_title: String,
    pub exam_title: String,
    /// Defaults to English.
    pub language: Option<String>,
    /// One of `multiple-choice`, `true-false`, `short-answer`.
    #[schema(value_type = Option<String>)]
    pub question_type: Option<QuestionKind>,
    /// One of `openai`, `gemini`. Defaults to the configured provider.
    #[schema(value_type = Option<String>)]
    pub provider: Option<ProviderKind>,
}

impl GenerateQuizRequest {
    fn into_core(self) -> GenerateFromSources {
        GenerateFromSources {
            sources: self.source_urls.into_iter().map(SourceUnit::url).collect(),
            num_questions: self.num_questions,
            quiz_title: self.quiz_title,
            exam_title: self.exam_title,
            language: self.language.unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            kind: self.question_type.unwrap_or_default(),
            provider: self.provider,
        }
    }
}

/// The response payload sent after questions were generated and stored.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateQuizResponse {
    exam_id: Uuid,
    quiz_index: usize,
    inserted_count: usize,
    created_quiz: bool,
    sources_used: usize,
    chunk_count: usize,
}

impl From<GenerationSummary> for GenerateQuizResponse {
    fn from(summary: GenerationSummary) -> Self {
        Self {
            exam_id: summary.exam_id,
            quiz_index: summary.quiz_index,
            inserted_count: summary.inserted_count,
            created_quiz: summary.created_quiz,
            sources_used: summary.sources_used,
            chunk_count: summary.chunk_count,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnswerPayload {
    pub question_id: String,
    pub submitted_answer: String,
}

/// The JSON payload for submitting answers to one quiz.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAttemptRequest {
    pub exam_id: Uuid,
    pub quiz_index: usize,
    pub answers: Vec<AnswerPayload>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAttemptResponse {
    correct_answers: usize,
    total_questions: usize,
    /// `true` when this was the user's first attempt at the quiz.
    created: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttemptHistoryEntry {
    correct_answers: usize,
    total_questions: usize,
    date: DateTime<Utc>,
}

impl From<QuizAttempt> for AttemptHistoryEntry {
    fn from(attempt: QuizAttempt) -> Self {
        Self {
            correct_answers: attempt.correct_answers,
            total_questions: attempt.total_questions,
            date: attempt.date,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AttemptHistoryQuery {
    pub exam_id: Uuid,
    pub quiz_index: usize,
}

//=========================================================================================
// Error Mapping
//=========================================================================================

type HandlerError = (StatusCode, String);

fn generation_failure(e: GenerationError) -> HandlerError {
    match e {
        GenerationError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        GenerationError::ExamNotFound(title) => {
            (StatusCode::NOT_FOUND, format!("exam not found: {}", title))
        }
        e @ (GenerationError::NoValidContent | GenerationError::NoValidQuestions) => {
            (StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
        }
        GenerationError::Store(e) => {
            error!("Failed to store generated questions: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to store generated questions".to_string(),
            )
        }
    }
}

fn submission_failure(e: SubmissionError) -> HandlerError {
    match e {
        e @ SubmissionError::QuizNotFound { .. } => (StatusCode::NOT_FOUND, e.to_string()),
        SubmissionError::Store(e) => {
            error!("Failed to record quiz attempt: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to record quiz attempt".to_string(),
            )
        }
    }
}

fn user_id_from_headers(headers: &HeaderMap) -> Result<Uuid, HandlerError> {
    let user_id_str = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                "x-user-id header is required".to_string(),
            )
        })?;

    Uuid::parse_str(user_id_str).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            "Invalid x-user-id format".to_string(),
        )
    })
}

//=========================================================================================
// Multipart Form Assembly
//=========================================================================================

/// The fields of a multipart generation request, collected in any order.
#[derive(Debug, Default)]
struct UploadForm {
    sources: Vec<SourceUnit>,
    num_questions: Option<String>,
    quiz_title: Option<String>,
    exam_title: Option<String>,
    language: Option<String>,
    question_type: Option<String>,
    provider: Option<String>,
}

impl UploadForm {
    fn set_text_field(&mut self, name: &str, value: String) {
        match name {
            "sourceUrls" | "sourceUrl" => self.sources.push(SourceUnit::url(value.trim())),
            "numQuestions" => self.num_questions = Some(value),
            "quizTitle" => self.quiz_title = Some(value),
            "examTitle" => self.exam_title = Some(value),
            "language" => self.language = Some(value),
            "questionType" => self.question_type = Some(value),
            "provider" => self.provider = Some(value),
            _ => {}
        }
    }

    fn into_core(self) -> Result<GenerateFromSources, String> {
        let num_questions = self
            .num_questions
            .as_deref()
            .ok_or_else(|| "numQuestions is required".to_string())?
            .trim()
            .parse::<usize>()
            .map_err(|_| "numQuestions must be a whole number".to_string())?;

        let kind = match self.question_type.as_deref().map(str::trim) {
            None | Some("") => QuestionKind::default(),
            Some(raw) => parse_label::<QuestionKind>(raw)
                .ok_or_else(|| format!("unknown questionType: {}", raw))?,
        };
        let provider = match self.provider.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(
                parse_label::<ProviderKind>(&raw.to_lowercase())
                    .ok_or_else(|| format!("unknown provider: {}", raw))?,
            ),
        };

        Ok(GenerateFromSources {
            sources: self.sources,
            num_questions,
            quiz_title: self.quiz_title.unwrap_or_default(),
            exam_title: self.exam_title.unwrap_or_default(),
            language: self
                .language
                .filter(|l| !l.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            kind,
            provider,
        })
    }
}

/// Parses a serde label such as `true-false` into its enum value.
fn parse_label<T: serde::de::DeserializeOwned>(label: &str) -> Option<T> {
    serde_json::from_value(serde_json::Value::String(label.to_string())).ok()
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Generate quiz questions from a list of web pages.
///
/// Questions are appended to the quiz with the given title, which is created
/// inside the exam if it does not exist yet.
#[utoipa::path(
    post,
    path = "/quizzes/generate",
    request_body = GenerateQuizRequest,
    responses(
        (status = 201, description = "Questions generated and stored", body = GenerateQuizResponse),
        (status = 400, description = "Invalid request (e.g., question count out of range, no sources)"),
        (status = 404, description = "Exam not found"),
        (status = 422, description = "No valid content extracted, or no valid questions generated"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn generate_quiz_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<GenerateQuizRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let summary = app_state
        .pipeline
        .generate_from_sources(payload.into_core())
        .await
        .map_err(generation_failure)?;

    Ok((StatusCode::CREATED, Json(GenerateQuizResponse::from(summary))))
}

/// Generate quiz questions from an uploaded UTF-8 text file.
///
/// Accepts a multipart/form-data request with a `file` part and the text
/// fields `numQuestions`, `quizTitle`, `examTitle` and optionally `language`,
/// `questionType`, `provider` and repeated `sourceUrls`.
#[utoipa::path(
    post,
    path = "/quizzes/generate/upload",
    request_body(content_type = "multipart/form-data", description = "The source file and generation fields."),
    responses(
        (status = 201, description = "Questions generated and stored", body = GenerateQuizResponse),
        (status = 400, description = "Invalid request (e.g., missing fields or file)"),
        (status = 404, description = "Exam not found"),
        (status = 413, description = "Uploaded file is too large"),
        (status = 422, description = "No valid content extracted, or no valid questions generated"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn upload_quiz_handler(
    State(app_state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HandlerError> {
    let max_bytes = app_state.config.pipeline.fetch_max_bytes;
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to read multipart data: {}", e),
        )
    })? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let file_name = field.file_name().unwrap_or("upload.txt").to_string();
            let data = field.bytes().await.map_err(|e| {
                (
                    StatusCode::BAD_REQUEST,
                    format!("Failed to read file bytes: {}", e),
                )
            })?;
            if data.len() > max_bytes {
                return Err((
                    StatusCode::PAYLOAD_TOO_LARGE,
                    format!("Uploaded file exceeds {} bytes", max_bytes),
                ));
            }
            info!(file_name = %file_name, bytes = data.len(), "Received upload");
            form.sources.push(SourceUnit::upload(file_name, data.to_vec()));
        } else {
            let value = field.text().await.map_err(|e| {
                (
                    StatusCode::BAD_REQUEST,
                    format!("Failed to read field {}: {}", name, e),
                )
            })?;
            form.set_text_field(&name, value);
        }
    }

    let request = form
        .into_core()
        .map_err(|msg| (StatusCode::BAD_REQUEST, msg))?;
    let summary = app_state
        .pipeline
        .generate_from_sources(request)
        .await
        .map_err(generation_failure)?;

    Ok((StatusCode::CREATED, Json(GenerateQuizResponse::from(summary))))
}

/// Grade and record an attempt at a quiz.
///
/// Every submission is appended to the user's history for that quiz.
/// A `x-user-id` header is required to associate the attempt with a user.
#[utoipa::path(
    post,
    path = "/attempts",
    request_body = SubmitAttemptRequest,
    responses(
        (status = 200, description = "Attempt graded and recorded", body = SubmitAttemptResponse),
        (status = 400, description = "Bad request (e.g., missing header)"),
        (status = 404, description = "Quiz not found"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn submit_attempt_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = user_id_from_headers(&headers)?;

    let submission = SubmitAttempt {
        user_id,
        exam_id: payload.exam_id,
        quiz_index: payload.quiz_index,
        answers: payload
            .answers
            .into_iter()
            .map(|a| UserAnswer {
                question_id: a.question_id,
                submitted_answer: a.submitted_answer,
            })
            .collect(),
    };

    let receipt = app_state
        .attempts
        .submit(submission)
        .await
        .map_err(submission_failure)?;

    Ok(Json(SubmitAttemptResponse {
        correct_answers: receipt.result.correct_answers,
        total_questions: receipt.result.total_questions,
        created: receipt.write == AttemptWrite::Created,
    }))
}

/// List a user's recorded attempts at one quiz, oldest first.
#[utoipa::path(
    get,
    path = "/attempts",
    responses(
        (status = 200, description = "The attempt history", body = Vec<AttemptHistoryEntry>),
        (status = 400, description = "Bad request (e.g., missing header)"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user."),
        AttemptHistoryQuery
    )
)]
pub async fn list_attempts_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<AttemptHistoryQuery>,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = user_id_from_headers(&headers)?;

    let history = app_state
        .attempts
        .history(user_id, query.exam_id, query.quiz_index)
        .await
        .map_err(submission_failure)?;

    let entries: Vec<AttemptHistoryEntry> = history.into_iter().map(Into::into).collect();
    Ok(Json(entries))
}
