//! crates/quiz_forge_core/src/generator.rs
//!
//! Asks a text-completion provider for questions about one chunk.
//!
//! Each chunk gets at most two attempts: the full instruction on the standard
//! model, then a simplified instruction on the fast model. If both fail the
//! chunk degrades to an empty contribution instead of an error.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::{GenerationRequest, ProviderKind, QuestionKind, RawGenerationResult};
use crate::ports::{CompletionOptions, ModelTier, ResponseFormat, TextCompletionService};
use crate::validator::is_parseable;

const FULL_INSTRUCTION_TEMPLATE: &str = r#"You are an expert teacher writing quiz questions for students.

Read the SOURCE TEXT below and write exactly {count} {kind} questions about its most important facts and ideas.

Rules:
- Write every question and every option in {language}.
- Each question must be answerable from the SOURCE TEXT alone.
- Do not refer to "the text" or "the passage" in the questions.
- Do not repeat a question.
{kind_rules}

Respond with ONLY a JSON object, no Markdown and no commentary, in exactly this shape:
{schema}

SOURCE TEXT:
---
{content}
---"#;

const SIMPLE_INSTRUCTION_TEMPLATE: &str = r#"Write {count} {kind} quiz questions in {language} about the text below.
Return only JSON shaped like {schema}

TEXT:
{content}"#;

const MULTIPLE_CHOICE_RULES: &str = "- Every question has exactly 4 options.\n- Exactly one option has \"correct\": true; the other three are plausible but wrong.";
const TRUE_FALSE_RULES: &str = "- Every question is a statement with exactly two options, \"True\" and \"False\".\n- Exactly one of the two options has \"correct\": true.";
const SHORT_ANSWER_RULES: &str = "- Every question has a short factual answer of one to three words.\n- Put that answer in \"answerKey\" and leave \"options\" empty.";

const MULTIPLE_CHOICE_SCHEMA: &str = r#"{"questions": [{"question": "string", "type": "multiple-choice", "options": [{"text": "string", "correct": true}, {"text": "string", "correct": false}, {"text": "string", "correct": false}, {"text": "string", "correct": false}]}]}"#;
const TRUE_FALSE_SCHEMA: &str = r#"{"questions": [{"question": "string", "type": "true-false", "options": [{"text": "True", "correct": false}, {"text": "False", "correct": true}]}]}"#;
const SHORT_ANSWER_SCHEMA: &str = r#"{"questions": [{"question": "string", "type": "short-answer", "options": [], "answerKey": "string"}]}"#;

//=========================================================================================
// Outcome Type
//=========================================================================================

/// What a chunk contributes after its attempts have settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// Parseable output from either attempt.
    Generated(RawGenerationResult),
    /// Both attempts failed; the chunk contributes `{ "questions": [] }`.
    Empty,
}

impl GenerationOutcome {
    pub fn into_raw(self) -> RawGenerationResult {
        match self {
            GenerationOutcome::Generated(raw) => raw,
            GenerationOutcome::Empty => RawGenerationResult::empty(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, GenerationOutcome::Empty)
    }
}

//=========================================================================================
// Provider Registry
//=========================================================================================

/// The interchangeable completion backends, plus the one used by default.
#[derive(Clone)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderKind, Arc<dyn TextCompletionService>>,
    default_kind: ProviderKind,
}

impl ProviderRegistry {
    pub fn new(default_kind: ProviderKind, default_provider: Arc<dyn TextCompletionService>) -> Self {
        let mut providers: HashMap<ProviderKind, Arc<dyn TextCompletionService>> = HashMap::new();
        providers.insert(default_kind, default_provider);
        Self {
            providers,
            default_kind,
        }
    }

    pub fn register(&mut self, kind: ProviderKind, provider: Arc<dyn TextCompletionService>) {
        self.providers.insert(kind, provider);
    }

    pub fn default_kind(&self) -> ProviderKind {
        self.default_kind
    }

    /// Resolves the requested provider, falling back to the default when it is not registered.
    pub fn resolve(&self, requested: Option<ProviderKind>) -> (ProviderKind, Arc<dyn TextCompletionService>) {
        let kind = requested
            .filter(|k| self.providers.contains_key(k))
            .unwrap_or(self.default_kind);
        if let Some(wanted) = requested.filter(|k| *k != kind) {
            warn!(requested = %wanted, using = %kind, "Requested provider is not configured");
        }
        let provider = self.providers[&kind].clone();
        (kind, provider)
    }
}

//=========================================================================================
// The Generator
//=========================================================================================

#[derive(Clone)]
pub struct QuestionGenerator {
    providers: ProviderRegistry,
}

impl QuestionGenerator {
    pub fn new(providers: ProviderRegistry) -> Self {
        Self { providers }
    }

    /// Generates raw question output for one chunk.
    ///
    /// Never fails: a chunk whose two attempts both fail yields `GenerationOutcome::Empty`.
    pub async fn generate(&self, request: &GenerationRequest) -> GenerationOutcome {
        let (kind, provider) = self.providers.resolve(request.provider);
        let chunk = request.chunk.index;

        let primary = build_prompt(request);
        match attempt(provider.as_ref(), &primary, ModelTier::Standard).await {
            Ok(raw) => return GenerationOutcome::Generated(raw),
            Err(reason) => {
                warn!(chunk, provider = %kind, %reason, "Generation failed; retrying with simplified prompt")
            }
        }

        let simplified = build_simplified_prompt(request);
        match attempt(provider.as_ref(), &simplified, ModelTier::Fast).await {
            Ok(raw) => GenerationOutcome::Generated(raw),
            Err(reason) => {
                warn!(chunk, provider = %kind, %reason, "Retry failed; chunk contributes no questions");
                GenerationOutcome::Empty
            }
        }
    }
}

async fn attempt(
    provider: &dyn TextCompletionService,
    prompt: &str,
    tier: ModelTier,
) -> Result<RawGenerationResult, String> {
    let options = CompletionOptions {
        tier,
        response_format: ResponseFormat::Json,
    };
    let text = provider
        .complete(prompt, options)
        .await
        .map_err(|e| e.to_string())?;

    if !is_parseable(&text) {
        debug!(output_len = text.len(), "Unparseable generator output");
        return Err("output is not valid JSON".to_string());
    }
    Ok(RawGenerationResult { text })
}

//=========================================================================================
// Prompt Construction
//=========================================================================================

fn kind_rules(kind: QuestionKind) -> &'static str {
    match kind {
        QuestionKind::MultipleChoice => MULTIPLE_CHOICE_RULES,
        QuestionKind::TrueFalse => TRUE_FALSE_RULES,
        QuestionKind::ShortAnswer => SHORT_ANSWER_RULES,
    }
}

/// The JSON shape the generator is instructed to return for `kind`.
pub fn output_schema(kind: QuestionKind) -> &'static str {
    match kind {
        QuestionKind::MultipleChoice => MULTIPLE_CHOICE_SCHEMA,
        QuestionKind::TrueFalse => TRUE_FALSE_SCHEMA,
        QuestionKind::ShortAnswer => SHORT_ANSWER_SCHEMA,
    }
}

/// The full instruction used on the first attempt.
pub fn build_prompt(request: &GenerationRequest) -> String {
    // {content} goes last so placeholder-like text inside the chunk is left alone.
    FULL_INSTRUCTION_TEMPLATE
        .replace("{count}", &request.num_questions.to_string())
        .replace("{kind_rules}", kind_rules(request.kind))
        .replace("{kind}", &request.kind.to_string())
        .replace("{language}", &request.language)
        .replace("{schema}", output_schema(request.kind))
        .replace("{content}", &request.chunk.text)
}

/// The shorter instruction used for the retry.
pub fn build_simplified_prompt(request: &GenerationRequest) -> String {
    SIMPLE_INSTRUCTION_TEMPLATE
        .replace("{count}", &request.num_questions.to_string())
        .replace("{kind}", &request.kind.to_string())
        .replace("{language}", &request.language)
        .replace("{schema}", output_schema(request.kind))
        .replace("{content}", &request.chunk.text)
}
