//! services/api/src/adapters/openai_llm.rs
//!
//! This module contains the OpenAI completion provider.
//! It implements the `TextCompletionService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, ResponseFormat as OpenAiResponseFormat,
    },
    Client,
};
use async_trait::async_trait;
use quiz_forge_core::ports::{
    CompletionOptions, ModelTier, PortError, PortResult, ResponseFormat, TextCompletionService,
};
use tracing::debug;

const SYSTEM_INSTRUCTIONS: &str =
    "You write quiz questions for students. Follow the user's output format exactly.";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `TextCompletionService` using OpenAI chat completions.
#[derive(Clone)]
pub struct OpenAiCompletionAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    fast_model: String,
}

impl OpenAiCompletionAdapter {
    /// Creates a new `OpenAiCompletionAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String, fast_model: String) -> Self {
        Self {
            client,
            model,
            fast_model,
        }
    }

    fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Standard => &self.model,
            ModelTier::Fast => &self.fast_model,
        }
    }
}

//=========================================================================================
// `TextCompletionService` Trait Implementation
//=========================================================================================

#[async_trait]
impl TextCompletionService for OpenAiCompletionAdapter {
    async fn complete(&self, prompt: &str, options: CompletionOptions) -> PortResult<String> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_INSTRUCTIONS)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let response_format = match options.response_format {
            ResponseFormat::Json => OpenAiResponseFormat::JsonObject,
            ResponseFormat::Text => OpenAiResponseFormat::Text,
        };

        let model = self.model_for(options.tier);
        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(messages)
            .response_format(response_format)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        debug!(model, "Sending chat completion request");

        // Call the API and manually map the error if it occurs, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Unexpected("OpenAI returned no text content in its response.".to_string())
            })
    }
}
