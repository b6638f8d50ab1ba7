//! In-memory stand-ins for the ports, shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use quiz_forge_core::{
    AnswerOption, AttemptWrite, CompletionOptions, DocumentStore, Exam, FetchError, FetchOptions,
    FetchedPage, HttpFetcher, PortError, PortResult, Question, QuestionKind, Quiz, QuizAttempt,
    QuizWrite, TextCompletionService,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

//=========================================================================================
// Document Store
//=========================================================================================

#[derive(Default)]
pub struct MemoryStore {
    exams: Mutex<HashMap<Uuid, Exam>>,
    attempts: Mutex<HashMap<(Uuid, Uuid, usize), Vec<QuizAttempt>>>,
}

impl MemoryStore {
    pub fn with_exam(title: &str) -> (Self, Uuid) {
        let store = Self::default();
        let id = store.insert_exam(title, Vec::new());
        (store, id)
    }

    pub fn insert_exam(&self, title: &str, quizzes: Vec<Quiz>) -> Uuid {
        let id = Uuid::new_v4();
        self.exams.lock().unwrap().insert(
            id,
            Exam {
                id,
                title: title.to_string(),
                quizzes,
            },
        );
        id
    }

    pub fn exam(&self, id: Uuid) -> Exam {
        self.exams.lock().unwrap()[&id].clone()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_exam_by_title(&self, title: &str) -> PortResult<Option<Exam>> {
        Ok(self
            .exams
            .lock()
            .unwrap()
            .values()
            .find(|e| e.title == title)
            .cloned())
    }

    async fn find_exam_by_id(&self, exam_id: Uuid) -> PortResult<Option<Exam>> {
        Ok(self.exams.lock().unwrap().get(&exam_id).cloned())
    }

    async fn append_to_quiz_titled(
        &self,
        exam_id: Uuid,
        title: &str,
        questions: &[Question],
    ) -> PortResult<QuizWrite> {
        let mut exams = self.exams.lock().unwrap();
        let exam = exams
            .get_mut(&exam_id)
            .ok_or_else(|| PortError::NotFound(exam_id.to_string()))?;
        match exam.quiz_index_by_title(title) {
            Some(quiz_index) => {
                exam.quizzes[quiz_index].questions.extend_from_slice(questions);
                Ok(QuizWrite {
                    quiz_index,
                    created: false,
                })
            }
            None => {
                exam.quizzes.push(Quiz {
                    title: title.to_string(),
                    questions: questions.to_vec(),
                });
                Ok(QuizWrite {
                    quiz_index: exam.quizzes.len() - 1,
                    created: true,
                })
            }
        }
    }

    async fn find_quiz_questions(
        &self,
        exam_id: Uuid,
        quiz_index: usize,
    ) -> PortResult<Vec<Question>> {
        self.exams
            .lock()
            .unwrap()
            .get(&exam_id)
            .and_then(|e| e.quizzes.get(quiz_index))
            .map(|q| q.questions.clone())
            .ok_or_else(|| PortError::NotFound(format!("{}/{}", exam_id, quiz_index)))
    }

    async fn upsert_quiz_attempt(
        &self,
        user_id: Uuid,
        exam_id: Uuid,
        quiz_index: usize,
        attempt: QuizAttempt,
    ) -> PortResult<AttemptWrite> {
        let mut attempts = self.attempts.lock().unwrap();
        let history = attempts.entry((user_id, exam_id, quiz_index)).or_default();
        history.push(attempt);
        Ok(if history.len() == 1 {
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
        Ok(self
            .attempts
            .lock()
            .unwrap()
            .get(&(user_id, exam_id, quiz_index))
            .cloned()
            .unwrap_or_default())
    }
}

//=========================================================================================
// Text Completion
//=========================================================================================

type Responder = dyn Fn(&str, CompletionOptions) -> PortResult<String> + Send + Sync;

/// A completion provider driven by a closure, counting its calls.
pub struct ScriptedCompletion {
    respond: Box<Responder>,
    calls: AtomicUsize,
    log: Mutex<Vec<(String, CompletionOptions)>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedCompletion {
    pub fn new(
        respond: impl Fn(&str, CompletionOptions) -> PortResult<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            respond: Box::new(respond),
            calls: AtomicUsize::new(0),
            log: Mutex::new(Vec::new()),
            delay: None,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Makes every call take `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Highest number of calls that were running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls whose prompt contains `marker`.
    pub fn calls_mentioning(&self, marker: &str) -> Vec<CompletionOptions> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(prompt, _)| prompt.contains(marker))
            .map(|(_, options)| *options)
            .collect()
    }
}

#[async_trait]
impl TextCompletionService for ScriptedCompletion {
    async fn complete(&self, prompt: &str, options: CompletionOptions) -> PortResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log.lock().unwrap().push((prompt.to_string(), options));
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        (self.respond)(prompt, options)
    }
}

/// A `{ "questions": [...] }` payload with `n` valid multiple-choice questions.
pub fn multiple_choice_payload(prefix: &str, n: usize) -> String {
    let questions: Vec<_> = (0..n)
        .map(|i| {
            json!({
                "question": format!("{} question {}", prefix, i),
                "type": "multiple-choice",
                "options": [
                    { "text": "A", "correct": true },
                    { "text": "B", "correct": false },
                    { "text": "C", "correct": false },
                    { "text": "D", "correct": false }
                ]
            })
        })
        .collect();
    json!({ "questions": questions }).to_string()
}

//=========================================================================================
// HTTP Fetch
//=========================================================================================

#[derive(Clone)]
pub enum PageScript {
    Html(String),
    Typed { content_type: String, body: String },
    Fail(u16),
    Hang(Duration),
}

#[derive(Default)]
pub struct StaticFetcher {
    pages: HashMap<String, PageScript>,
    calls: AtomicUsize,
}

impl StaticFetcher {
    pub fn with_page(mut self, url: &str, page: PageScript) -> Self {
        self.pages.insert(url.to_string(), page);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpFetcher for StaticFetcher {
    async fn get(&self, url: &str, _options: &FetchOptions) -> Result<FetchedPage, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.pages.get(url).cloned() {
            Some(PageScript::Html(body)) => Ok(FetchedPage {
                content_type: Some("text/html; charset=utf-8".to_string()),
                body,
            }),
            Some(PageScript::Typed { content_type, body }) => Ok(FetchedPage {
                content_type: Some(content_type),
                body,
            }),
            Some(PageScript::Fail(status)) => Err(FetchError::Status(status)),
            Some(PageScript::Hang(duration)) => {
                tokio::time::sleep(duration).await;
                Err(FetchError::Transport("hung".to_string()))
            }
            None => Err(FetchError::Status(404)),
        }
    }
}

/// An HTML page whose article holds `words` copies of `word`.
pub fn article_page(word: &str, words: usize) -> String {
    format!(
        "<html><body><nav>Menu</nav><article><p>{}</p></article></body></html>",
        vec![word; words].join(" ")
    )
}

//=========================================================================================
// Question Builders
//=========================================================================================

pub fn mc_question(id: &str, correct: &str) -> Question {
    Question {
        id: id.to_string(),
        text: format!("Question {}", id),
        kind: QuestionKind::MultipleChoice,
        options: ["A", "B", "C", "D"]
            .iter()
            .map(|t| AnswerOption {
                text: t.to_string(),
                correct: *t == correct,
            })
            .collect(),
        answer_key: None,
    }
}

pub fn tf_question(id: &str, correct: &str) -> Question {
    Question {
        id: id.to_string(),
        text: format!("Statement {}", id),
        kind: QuestionKind::TrueFalse,
        options: ["True", "False"]
            .iter()
            .map(|t| AnswerOption {
                text: t.to_string(),
                correct: *t == correct,
            })
            .collect(),
        answer_key: None,
    }
}

pub fn sa_question(id: &str, key: &str) -> Question {
    Question {
        id: id.to_string(),
        text: format!("Short {}", id),
        kind: QuestionKind::ShortAnswer,
        options: Vec::new(),
        answer_key: Some(key.to_string()),
    }
}
