//! AI coding assistant on top of the aggregator.
//!
//! Builds task prompts, starts streaming sessions for generation and
//! debugging, interprets spoken commands, and writes completed results back
//! into workspace files. Sessions never touch the workspace themselves; the
//! caller decides when to call [`CodeAssistant::write_back`].

pub mod prompts;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};

use crate::config::ReasoningEffort;
use crate::errors::NexusError;
use crate::llm::{GenerationBackend, GenerationRequest, GenerationTask};
use crate::stream::{Aggregator, SessionHandle, StreamOutcome};
use crate::workspace::{FileId, Language, Workspace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Build,
    Fix,
    #[serde(other)]
    Other,
}

/// Structured reading of a spoken command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceCommand {
    pub intent: Intent,
    pub description: String,
    #[serde(rename = "suggestedLanguage", default)]
    pub suggested_language: String,
}

impl VoiceCommand {
    /// The suggested language, if it names one the editor knows.
    pub fn language(&self) -> Option<Language> {
        self.suggested_language.parse().ok()
    }
}

/// Per-call overrides for generation requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerationOptions {
    pub temperature: Option<f32>,
    pub reasoning_effort: Option<ReasoningEffort>,
}

#[derive(Clone)]
pub struct CodeAssistant {
    aggregator: Aggregator,
}

impl CodeAssistant {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            aggregator: Aggregator::new(backend),
        }
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn generate_code<F>(&self, request: &str, language: Language, on_update: F) -> SessionHandle
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.generate_code_with(request, language, GenerationOptions::default(), on_update)
    }

    pub fn generate_code_with<F>(
        &self,
        request: &str,
        language: Language,
        options: GenerationOptions,
        on_update: F,
    ) -> SessionHandle
    where
        F: FnMut(&str) + Send + 'static,
    {
        let mut generation = GenerationRequest::new(prompts::generate_prompt(request, language))
            .with_task(GenerationTask::Generate)
            .with_language(language);
        if let Some(temperature) = options.temperature {
            generation = generation.with_temperature(temperature);
        }
        if let Some(effort) = options.reasoning_effort {
            generation = generation.with_reasoning_effort(effort);
        }
        self.aggregator.start_stream(generation, on_update)
    }

    /// Streams an explanation of the errors in `code` plus a fixed version.
    pub fn debug_code<F>(&self, code: &str, language: Language, on_update: F) -> SessionHandle
    where
        F: FnMut(&str) + Send + 'static,
    {
        let request = GenerationRequest::new(prompts::debug_prompt(code, language))
            .with_task(GenerationTask::Debug)
            .with_language(language);
        self.aggregator.start_stream(request, on_update)
    }

    pub async fn interpret_command(&self, transcript: &str) -> Result<VoiceCommand, NexusError> {
        let request = GenerationRequest::new(prompts::interpret_prompt(transcript))
            .with_task(GenerationTask::Interpret)
            .with_response_schema(prompts::voice_command_schema())
            .one_shot();

        let text = self.aggregator.generate(request).await?;
        parse_voice_command(&text)
    }

    /// Writes a finished session into a file. Only completed text is written;
    /// failed and cancelled outcomes leave the file untouched and return
    /// `Ok(false)`. A language, when given, replaces the file's language.
    pub fn write_back(
        workspace: &mut Workspace,
        id: FileId,
        outcome: &Result<StreamOutcome, NexusError>,
        language: Option<Language>,
    ) -> Result<bool, NexusError> {
        if workspace.get(id).is_none() {
            return Err(NexusError::FileNotFound(id));
        }

        let text = match outcome {
            Ok(StreamOutcome::Completed(text)) => text,
            Ok(StreamOutcome::Cancelled) => {
                log::debug!("Not writing cancelled result into {}", id);
                return Ok(false);
            }
            Err(e) => {
                log::debug!("Not writing failed result into {}: {}", id, e);
                return Ok(false);
            }
        };

        workspace.set_content(id, extract_code(text))?;
        if let Some(language) = language {
            workspace.set_language(id, language)?;
        }
        Ok(true)
    }
}

fn fence_pattern() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)^\s*```[\w+#.-]*[ \t]*\r?\n(.*?)\r?\n?```\s*$").expect("valid fence regex")
    })
}

/// Unwraps a response that is exactly one fenced markdown block. Anything
/// else, including prose around a block, is returned unchanged.
pub fn extract_code(text: &str) -> String {
    match fence_pattern().captures(text) {
        Some(captures) if !captures[1].contains("```") => captures[1].to_string(),
        _ => text.to_string(),
    }
}

fn parse_voice_command(text: &str) -> Result<VoiceCommand, NexusError> {
    let json = extract_code(text);
    serde_json::from_str(json.trim()).map_err(|e| {
        NexusError::ParsingError(format!("Failed to parse voice command response: {}", e))
    })
}
