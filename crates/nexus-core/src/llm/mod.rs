//! Generation backends.
//!
//! A backend turns a [`GenerationRequest`] into an ordered stream of text
//! fragments, each one the new text since the previous fragment. One-shot
//! responses are a stream with exactly one fragment, so the aggregator has a
//! single code path for both.

use async_trait::async_trait;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::pin::Pin;
use std::sync::Arc;

use crate::config::{LlmConfig, LlmProvider, ReasoningEffort};
use crate::errors::NexusError;
use crate::workspace::Language;

pub mod echo;
pub mod gemini;
pub mod sse;

pub use echo::EchoBackend;
pub use gemini::GeminiClient;

/// Ordered fragments from one generation call. The stream ending means the
/// upstream call succeeded; an `Err` item is a terminal failure.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, NexusError>> + Send>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationTask {
    #[default]
    Generate,
    Debug,
    Chat,
    Interpret,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    #[default]
    Streaming,
    OneShot,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
    pub task: GenerationTask,
    /// Overrides the configured temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Overrides the configured reasoning effort.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<ReasoningEffort>,
    pub mode: GenerationMode,
    /// Requests a JSON response matching this schema.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_task(mut self, task: GenerationTask) -> Self {
        self.task = task;
        self
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_reasoning_effort(mut self, effort: ReasoningEffort) -> Self {
        self.reasoning_effort = Some(effort);
        self
    }

    pub fn with_response_schema(mut self, schema: Value) -> Self {
        self.response_schema = Some(schema);
        self
    }

    pub fn one_shot(mut self) -> Self {
        self.mode = GenerationMode::OneShot;
        self
    }
}

#[async_trait]
pub trait GenerationBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Dispatches the request. Errors returned here (connection refused,
    /// non-success status) fail the session before any fragment arrives.
    async fn stream(&self, request: GenerationRequest) -> Result<FragmentStream, NexusError>;
}

/// Helpers for building fragment streams.
pub mod fragments {
    use super::FragmentStream;
    use crate::errors::NexusError;
    use futures_util::{stream, Stream};

    /// Boxes a generated stream, pinning its error type to [`NexusError`].
    pub fn boxed<S>(stream: S) -> FragmentStream
    where
        S: Stream<Item = Result<String, NexusError>> + Send + 'static,
    {
        Box::pin(stream)
    }

    /// A whole response delivered as one fragment.
    pub fn single(text: impl Into<String>) -> FragmentStream {
        let text = text.into();
        Box::pin(stream::once(async move { Ok::<_, NexusError>(text) }))
    }

    pub fn from_results(items: Vec<Result<String, NexusError>>) -> FragmentStream {
        Box::pin(stream::iter(items))
    }
}

/// Create a generation backend based on the provider configuration
pub fn create_backend(config: &LlmConfig) -> Result<Arc<dyn GenerationBackend>, NexusError> {
    match &config.provider {
        LlmProvider::Gemini | LlmProvider::Custom { .. } => gemini::create_client(config),
        LlmProvider::Echo => Ok(Arc::new(EchoBackend::new())),
    }
}
