//! Google Gemini API client
//!
//! Streaming requests use `streamGenerateContent?alt=sse`; every SSE payload is
//! a partial response whose text parts make up one fragment. One-shot
//! requests use `generateContent` and yield the whole text as one fragment.

use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::TryStreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio_util::io::StreamReader;

use super::sse::SseDecoder;
use super::{fragments, FragmentStream, GenerationBackend, GenerationMode, GenerationRequest};
use crate::config::{LlmConfig, LlmProvider, ModelParameters, ReasoningEffort, DEFAULT_API_KEY_ENV};
use crate::errors::NexusError;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Finish reasons that mean the model refused or was cut off by policy.
const BLOCKING_FINISH_REASONS: [&str; 5] = ["SAFETY", "RECITATION", "BLOCKLIST", "PROHIBITED_CONTENT", "SPII"];

/// Google Gemini API client
pub struct GeminiClient {
    api_key: String,
    model: String,
    client: Client,
    base_url: String,
    parameters: ModelParameters,
    streaming: bool,
    timeout: Duration,
}

impl GeminiClient {
    /// Create a new Gemini client
    pub fn new(api_key: String, model: String) -> Self {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL.to_string())
    }

    /// Create a new Gemini client with custom base URL
    pub fn with_base_url(api_key: String, model: String, base_url: String) -> Self {
        Self {
            api_key,
            model,
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            parameters: ModelParameters::default(),
            streaming: true,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_parameters(mut self, parameters: ModelParameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// When disabled, streaming requests are served by the one-shot endpoint.
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// Timeout for one-shot requests.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    /// Set on thought summaries; those are not part of the answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thought: Option<bool>,
}

impl GeminiPart {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            thought: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    #[serde(rename = "topP")]
    top_p: f32,
    #[serde(rename = "stopSequences", skip_serializing_if = "Vec::is_empty")]
    stop_sequences: Vec<String>,
    #[serde(rename = "thinkingConfig", skip_serializing_if = "Option::is_none")]
    thinking_config: Option<GeminiThinkingConfig>,
    #[serde(rename = "responseMimeType", skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(rename = "responseSchema", skip_serializing_if = "Option::is_none")]
    response_schema: Option<Value>,
}

#[derive(Debug, Serialize)]
struct GeminiThinkingConfig {
    #[serde(rename = "thinkingLevel")]
    thinking_level: &'static str,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(rename = "promptFeedback", default)]
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
    #[serde(rename = "finishReason", default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiPromptFeedback {
    #[serde(rename = "blockReason", default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorDetails,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetails {
    code: u16,
    message: String,
}

/// A stream payload is either a partial response or an error object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GeminiStreamPayload {
    Error(GeminiError),
    Response(GeminiResponse),
}

impl GeminiClient {
    fn build_request(&self, request: &GenerationRequest) -> GeminiRequest {
        let effort = request
            .reasoning_effort
            .unwrap_or(self.parameters.reasoning_effort);

        let generation_config = GeminiGenerationConfig {
            temperature: request.temperature.unwrap_or(self.parameters.temperature),
            max_output_tokens: self.parameters.max_output_tokens,
            top_p: self.parameters.top_p,
            stop_sequences: self.parameters.stop_sequences.clone(),
            thinking_config: accepts_thinking_level(&self.model).then(|| GeminiThinkingConfig {
                thinking_level: match effort {
                    ReasoningEffort::Low => "low",
                    ReasoningEffort::High => "high",
                },
            }),
            response_mime_type: request
                .response_schema
                .as_ref()
                .map(|_| "application/json".to_string()),
            response_schema: request.response_schema.clone(),
        };

        GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart::text(request.prompt.clone())],
            }],
            generation_config,
            system_instruction: request.system_instruction.as_ref().map(|instruction| GeminiContent {
                role: None,
                parts: vec![GeminiPart::text(instruction.clone())],
            }),
        }
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, self.model, method)
    }

    async fn error_from_response(response: reqwest::Response) -> NexusError {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        if let Ok(gemini_error) = serde_json::from_str::<GeminiError>(&error_text) {
            return NexusError::GenerationFailed(format!(
                "Gemini API error {}: {}",
                gemini_error.error.code, gemini_error.error.message
            ));
        }

        NexusError::GenerationFailed(format!(
            "Gemini API request failed with status {}: {}",
            status, error_text
        ))
    }

    async fn generate_once(&self, request: &GenerationRequest) -> Result<String, NexusError> {
        let body = self.build_request(request);
        let url = self.endpoint("generateContent");
        log::debug!("Gemini one-shot request to {}", url);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| NexusError::GenerationFailed(format!("Gemini API request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let gemini_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| NexusError::ParsingError(format!("Failed to parse Gemini response: {}", e)))?;

        if gemini_response.candidates.is_empty() {
            check_blocked(&gemini_response)?;
            return Err(NexusError::GenerationFailed(
                "No candidates in Gemini response".to_string(),
            ));
        }
        response_text(&gemini_response)
    }

    async fn open_stream(&self, request: &GenerationRequest) -> Result<FragmentStream, NexusError> {
        let body = self.build_request(request);
        let url = format!("{}?alt=sse", self.endpoint("streamGenerateContent"));
        log::debug!("Gemini streaming request to {}", url);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| NexusError::GenerationFailed(format!("Gemini API request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let bytes = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Interrupted, e.to_string()));
        let mut lines = StreamReader::new(bytes).lines();

        let stream = try_stream! {
            let mut decoder = SseDecoder::new();
            loop {
                let line = lines.next_line().await.map_err(|e| {
                    NexusError::GenerationFailed(format!("Gemini stream interrupted: {}", e))
                })?;
                let Some(line) = line else { break };

                if let Some(event) = decoder.push_line(&line) {
                    if let Some(fragment) = parse_stream_payload(&event.data)? {
                        yield fragment;
                    }
                }
            }
            if let Some(event) = decoder.finish() {
                if let Some(fragment) = parse_stream_payload(&event.data)? {
                    yield fragment;
                }
            }
        };

        Ok(fragments::boxed(stream))
    }
}

/// `thinkingLevel` exists from Gemini 3 on. Older models take a token budget
/// instead and reject the field, so they run with their default thinking.
fn accepts_thinking_level(model: &str) -> bool {
    let name = model.rsplit('/').next().unwrap_or(model);
    name.strip_prefix("gemini-")
        .and_then(|rest| rest.split(['.', '-']).next())
        .and_then(|major| major.parse::<u32>().ok())
        .is_some_and(|major| major >= 3)
}

/// Text of the first candidate, thought parts excluded.
fn response_text(response: &GeminiResponse) -> Result<String, NexusError> {
    check_blocked(response)?;

    let Some(candidate) = response.candidates.first() else {
        return Ok(String::new());
    };

    let text: String = candidate
        .content
        .iter()
        .flat_map(|content| content.parts.iter())
        .filter(|part| !part.thought.unwrap_or(false))
        .filter_map(|part| part.text.as_deref())
        .collect();

    if text.is_empty() {
        if let Some(reason) = candidate.finish_reason.as_deref() {
            if BLOCKING_FINISH_REASONS.contains(&reason) {
                return Err(NexusError::GenerationFailed(format!(
                    "Gemini stopped generating: {}",
                    reason
                )));
            }
        }
    }

    Ok(text)
}

fn check_blocked(response: &GeminiResponse) -> Result<(), NexusError> {
    if let Some(reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|feedback| feedback.block_reason.as_deref())
    {
        return Err(NexusError::GenerationFailed(format!(
            "Gemini blocked the prompt: {}",
            reason
        )));
    }
    Ok(())
}

/// Decodes one SSE payload into a fragment. Payloads without text yield
/// `None`; anything unparsable fails the stream.
fn parse_stream_payload(data: &str) -> Result<Option<String>, NexusError> {
    let payload: GeminiStreamPayload = serde_json::from_str(data).map_err(|e| {
        NexusError::ParsingError(format!("Malformed Gemini stream fragment: {}", e))
    })?;

    match payload {
        GeminiStreamPayload::Error(error) => Err(NexusError::GenerationFailed(format!(
            "Gemini API error {}: {}",
            error.error.code, error.error.message
        ))),
        GeminiStreamPayload::Response(response) => {
            let text = response_text(&response)?;
            Ok((!text.is_empty()).then_some(text))
        }
    }
}

#[async_trait]
impl GenerationBackend for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn stream(&self, request: GenerationRequest) -> Result<FragmentStream, NexusError> {
        if request.mode == GenerationMode::OneShot || !self.streaming {
            let text = self.generate_once(&request).await?;
            return Ok(fragments::single(text));
        }
        self.open_stream(&request).await
    }
}

/// Create a Gemini client from configuration
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn GenerationBackend>, NexusError> {
    let api_key = match &config.auth.api_key {
        Some(key) => key.clone(),
        None => match &config.auth.api_key_env {
            Some(env_var) => env::var(env_var).map_err(|_| {
                NexusError::ConfigError(format!(
                    "Environment variable {} not found for Gemini API key",
                    env_var
                ))
            })?,
            None => env::var(DEFAULT_API_KEY_ENV).map_err(|_| {
                NexusError::ConfigError("No API key found for Gemini. Set GEMINI_API_KEY environment variable or provide api_key in config".to_string())
            })?,
        },
    };

    let client = match &config.provider {
        LlmProvider::Gemini => GeminiClient::new(api_key, config.model.clone()),
        LlmProvider::Custom { base_url } => {
            GeminiClient::with_base_url(api_key, config.model.clone(), base_url.clone())
        }
        LlmProvider::Echo => {
            return Err(NexusError::ConfigError(
                "Invalid provider for Gemini client".to_string(),
            ))
        }
    };

    Ok(Arc::new(
        client
            .with_parameters(config.parameters.clone())
            .with_streaming(config.streaming)
            .with_timeout(Duration::from_secs(config.timeout)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmAuth;
    use crate::llm::GenerationTask;
    use crate::test_utils::mock_gemini_server::{MockGeminiServer, MockReply};
    use futures_util::StreamExt;
    use serde_json::json;

    fn client_for(server: &MockGeminiServer) -> GeminiClient {
        GeminiClient::with_base_url("test-key".to_string(), "gemini-test".to_string(), server.base_url())
    }

    fn chunk(text: &str) -> String {
        json!({"candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]}).to_string()
    }

    #[test]
    fn test_gemini_client_creation() {
        let client = GeminiClient::new("test-key".to_string(), "gemini-pro".to_string());
        assert_eq!(client.api_key, "test-key");
        assert_eq!(client.model, "gemini-pro");
        assert_eq!(client.base_url, DEFAULT_BASE_URL);
        assert_eq!(
            client.endpoint("generateContent"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-pro:generateContent"
        );
    }

    #[test]
    fn test_request_shape() {
        let client = GeminiClient::new("k".to_string(), "gemini-3.1-pro-preview".to_string());
        let request = GenerationRequest::new("build a clock")
            .with_task(GenerationTask::Generate)
            .with_system_instruction("be terse")
            .with_temperature(0.1)
            .with_reasoning_effort(ReasoningEffort::High);

        let body = serde_json::to_value(client.build_request(&request)).unwrap();

        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "build a clock");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be terse");
        assert!((body["generationConfig"]["temperature"].as_f64().unwrap() - 0.1).abs() < 1e-6);
        assert_eq!(body["generationConfig"]["thinkingConfig"]["thinkingLevel"], "high");
        assert!(body["generationConfig"].get("responseSchema").is_none());
        assert!(body["generationConfig"].get("stopSequences").is_none());
    }

    #[test]
    fn test_request_uses_configured_defaults_and_schema() {
        let client = GeminiClient::new("k".to_string(), "gemini-3-flash".to_string());
        let request = GenerationRequest::new("x").with_response_schema(json!({"type": "OBJECT"}));
        let body = serde_json::to_value(client.build_request(&request)).unwrap();

        assert!((body["generationConfig"]["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
        assert_eq!(body["generationConfig"]["thinkingConfig"]["thinkingLevel"], "low");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["responseSchema"]["type"], "OBJECT");
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn test_thinking_level_only_for_models_that_accept_it() {
        assert!(accepts_thinking_level("gemini-3.1-pro-preview"));
        assert!(accepts_thinking_level("models/gemini-3-flash"));
        assert!(!accepts_thinking_level("gemini-2.5-flash"));
        assert!(!accepts_thinking_level("gemini-1.5-pro"));
        assert!(!accepts_thinking_level("my-finetune"));

        let client = GeminiClient::new("k".to_string(), "gemini-2.5-flash".to_string());
        let request = GenerationRequest::new("x").with_reasoning_effort(ReasoningEffort::High);
        let body = serde_json::to_value(client.build_request(&request)).unwrap();
        assert!(body["generationConfig"].get("thinkingConfig").is_none());
    }

    #[test]
    fn test_parse_stream_payloads() {
        assert_eq!(parse_stream_payload(&chunk("Hel")).unwrap(), Some("Hel".to_string()));

        let usage_only = json!({"usageMetadata": {"totalTokenCount": 5}}).to_string();
        assert_eq!(parse_stream_payload(&usage_only).unwrap(), None);

        let with_thought = json!({"candidates": [{"content": {"parts": [
            {"text": "thinking...", "thought": true},
            {"text": "answer"}
        ]}}]})
        .to_string();
        assert_eq!(parse_stream_payload(&with_thought).unwrap(), Some("answer".to_string()));

        assert!(matches!(
            parse_stream_payload("{not json"),
            Err(NexusError::ParsingError(_))
        ));

        let error = json!({"error": {"code": 429, "message": "quota"}}).to_string();
        assert_eq!(
            parse_stream_payload(&error).unwrap_err(),
            NexusError::GenerationFailed("Gemini API error 429: quota".to_string())
        );
    }

    #[test]
    fn test_blocked_responses_fail() {
        let blocked = json!({"promptFeedback": {"blockReason": "SAFETY"}}).to_string();
        assert!(parse_stream_payload(&blocked).is_err());

        let stopped = json!({"candidates": [{"finishReason": "RECITATION"}]}).to_string();
        assert!(parse_stream_payload(&stopped).is_err());

        let finished = json!({"candidates": [{"finishReason": "STOP"}]}).to_string();
        assert_eq!(parse_stream_payload(&finished).unwrap(), None);
    }

    #[tokio::test]
    async fn test_streaming_against_mock_server() {
        let server = MockGeminiServer::start(vec![MockReply::Sse(vec![
            chunk("Hel"),
            json!({"usageMetadata": {"totalTokenCount": 3}}).to_string(),
            chunk("lo"),
        ])])
        .await;

        let fragments: Vec<_> = client_for(&server)
            .stream(GenerationRequest::new("greet"))
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(fragments, vec![Ok("Hel".to_string()), Ok("lo".to_string())]);

        let recorded = server.recorded_requests();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].model_action, "gemini-test:streamGenerateContent");
        assert_eq!(recorded[0].api_key.as_deref(), Some("test-key"));
        assert_eq!(recorded[0].body["contents"][0]["parts"][0]["text"], "greet");
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_streaming_malformed_fragment_fails_after_good_ones() {
        let server = MockGeminiServer::start(vec![MockReply::Sse(vec![
            chunk("ok"),
            "{broken".to_string(),
            chunk("never"),
        ])])
        .await;

        let mut stream = client_for(&server)
            .stream(GenerationRequest::new("x"))
            .await
            .unwrap();

        assert_eq!(stream.next().await, Some(Ok("ok".to_string())));
        assert!(matches!(stream.next().await, Some(Err(NexusError::ParsingError(_)))));
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_one_shot_against_mock_server() {
        let server = MockGeminiServer::start(vec![MockReply::Json(json!({
            "candidates": [{"content": {"parts": [{"text": "whole "}, {"text": "answer"}]}, "finishReason": "STOP"}]
        }))])
        .await;

        let fragments: Vec<_> = client_for(&server)
            .stream(GenerationRequest::new("x").one_shot())
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(fragments, vec![Ok("whole answer".to_string())]);
        assert_eq!(server.recorded_requests()[0].model_action, "gemini-test:generateContent");
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_streaming_disabled_uses_one_shot_endpoint() {
        let server = MockGeminiServer::start(vec![MockReply::Json(json!({
            "candidates": [{"content": {"parts": [{"text": "done"}]}}]
        }))])
        .await;

        let client = client_for(&server).with_streaming(false);
        let fragments: Vec<_> = client
            .stream(GenerationRequest::new("x"))
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(fragments, vec![Ok("done".to_string())]);
        assert_eq!(server.recorded_requests()[0].model_action, "gemini-test:generateContent");
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_error_status_surfaces_gemini_message() {
        let server = MockGeminiServer::start(vec![MockReply::Error(
            400,
            json!({"error": {"code": 400, "message": "API key not valid"}}).to_string(),
        )])
        .await;

        let err = client_for(&server)
            .stream(GenerationRequest::new("x"))
            .await
            .err()
            .unwrap();

        assert_eq!(
            err,
            NexusError::GenerationFailed("Gemini API error 400: API key not valid".to_string())
        );
        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_error_status_with_plain_body() {
        let server = MockGeminiServer::start(vec![MockReply::Error(503, "overloaded".to_string())]).await;

        let err = client_for(&server)
            .stream(GenerationRequest::new("x").one_shot())
            .await
            .err()
            .unwrap();

        let message = err.to_string();
        assert!(message.contains("503"));
        assert!(message.contains("overloaded"));
        server.shutdown().await;
    }

    #[test]
    fn test_create_client_from_config() {
        let config = LlmConfig {
            provider: LlmProvider::Gemini,
            model: "gemini-pro".to_string(),
            auth: LlmAuth {
                api_key: Some("test-key".to_string()),
                api_key_env: None,
            },
            ..Default::default()
        };

        let client = create_client(&config).unwrap();
        assert_eq!(client.name(), "gemini");
    }

    #[test]
    fn test_create_client_rejects_echo_provider() {
        let config = LlmConfig {
            provider: LlmProvider::Echo,
            auth: LlmAuth {
                api_key: Some("k".to_string()),
                api_key_env: None,
            },
            ..Default::default()
        };
        assert!(create_client(&config).is_err());
    }
}
