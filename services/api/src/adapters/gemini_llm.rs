//! services/api/src/adapters/gemini_llm.rs
//!
//! This module contains the Gemini completion provider, talking to the
//! `generateContent` REST endpoint with `reqwest`.
//! It implements the `TextCompletionService` port from the `core` crate.

use async_trait::async_trait;
use quiz_forge_core::ports::{
    CompletionOptions, ModelTier, PortError, PortResult, ResponseFormat, TextCompletionService,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `TextCompletionService` using the Gemini API.
#[derive(Clone)]
pub struct GeminiCompletionAdapter {
    http: Client,
    api_base: String,
    api_key: String,
    model: String,
    fast_model: String,
}

impl GeminiCompletionAdapter {
    /// Creates a new `GeminiCompletionAdapter`.
    pub fn new(
        http: Client,
        api_base: String,
        api_key: String,
        model: String,
        fast_model: String,
    ) -> Self {
        Self {
            http,
            api_base,
            api_key,
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
// Wire Types
//=========================================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate.
    fn into_text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        (!text.is_empty()).then_some(text)
    }
}

//=========================================================================================
// `TextCompletionService` Trait Implementation
//=========================================================================================

#[async_trait]
impl TextCompletionService for GeminiCompletionAdapter {
    async fn complete(&self, prompt: &str, options: CompletionOptions) -> PortResult<String> {
        let model = self.model_for(options.tier);
        let endpoint = format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base.trim_end_matches('/'),
            model
        );

        let payload = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: match options.response_format {
                    ResponseFormat::Json => Some("application/json"),
                    ResponseFormat::Text => None,
                },
            },
        };

        debug!(model, "Sending generateContent request");

        let response = self
            .http
            .post(endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&payload)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("Gemini request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            warn!(model, %status, "Gemini request was rejected");
            return Err(PortError::Unexpected(format!(
                "Gemini request failed: {} {}",
                status, text
            )));
        }

        let output: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("Invalid Gemini response JSON: {}", e)))?;

        output.into_text().ok_or_else(|| {
            PortError::Unexpected("Gemini returned no text content in its response.".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(server: &MockServer) -> GeminiCompletionAdapter {
        GeminiCompletionAdapter::new(
            Client::new(),
            server.uri(),
            "test-key".to_string(),
            "gemini-pro".to_string(),
            "gemini-flash".to_string(),
        )
    }

    fn json_options(tier: ModelTier) -> CompletionOptions {
        CompletionOptions {
            tier,
            response_format: ResponseFormat::Json,
        }
    }

    fn reply(text: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }]
        }))
    }

    #[tokio::test]
    async fn test_standard_tier_requests_json_from_main_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-pro:generateContent"))
            .and(query_param("key", "test-key"))
            .and(body_partial_json(json!({
                "contents": [{ "role": "user", "parts": [{ "text": "Write questions" }] }],
                "generationConfig": { "responseMimeType": "application/json" }
            })))
            .respond_with(reply(r#"{"questions": []}"#))
            .expect(1)
            .mount(&server)
            .await;

        let text = assert_ok!(
            adapter(&server)
                .complete("Write questions", json_options(ModelTier::Standard))
                .await
        );
        assert_eq!(text, r#"{"questions": []}"#);
    }

    #[tokio::test]
    async fn test_fast_tier_uses_fast_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-flash:generateContent"))
            .respond_with(reply("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let text = assert_ok!(
            adapter(&server)
                .complete("retry", json_options(ModelTier::Fast))
                .await
        );
        assert_eq!(text, "ok");
    }

    #[tokio::test]
    async fn test_multi_part_candidate_is_joined() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [{ "text": "{\"questions\":" }, { "text": " []}" }] } }]
            })))
            .mount(&server)
            .await;

        let text = assert_ok!(
            adapter(&server)
                .complete("p", json_options(ModelTier::Standard))
                .await
        );
        assert_eq!(text, "{\"questions\": []}");
    }

    #[tokio::test]
    async fn test_error_status_becomes_port_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
            .mount(&server)
            .await;

        let err = assert_err!(
            adapter(&server)
                .complete("p", json_options(ModelTier::Standard))
                .await
        );
        assert!(matches!(err, PortError::Unexpected(ref msg) if msg.contains("429")));
    }

    #[tokio::test]
    async fn test_empty_candidates_are_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&server)
            .await;

        let err = assert_err!(
            adapter(&server)
                .complete("p", json_options(ModelTier::Standard))
                .await
        );
        assert!(matches!(err, PortError::Unexpected(_)));
    }
}
