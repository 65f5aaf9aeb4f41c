//! Configuration type definitions.
//!
//! Every section is optional in YAML; a minimal file only names what differs
//! from the defaults below.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::errors::NexusError;
use crate::workspace::Language;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NexusConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub parameters: ModelParameters,
    #[serde(default)]
    pub auth: LlmAuth,
    /// Use the streaming endpoint for generate/debug requests.
    #[serde(default = "default_true")]
    pub streaming: bool,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            model: default_model(),
            parameters: ModelParameters::default(),
            auth: LlmAuth::default(),
            streaming: true,
            timeout: default_timeout(),
        }
    }
}

/// Generation backends.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Gemini,
    /// Gemini-compatible API served from another base URL.
    Custom { base_url: String },
    /// Offline backend that streams the prompt back.
    Echo,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    #[default]
    Low,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelParameters {
    /// Creativity of the generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    /// Sent as `thinkingLevel`, which only Gemini 3 and later accept. Older
    /// models ignore this setting.
    #[serde(default)]
    pub reasoning_effort: ReasoningEffort,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_output_tokens: default_max_output_tokens(),
            reasoning_effort: ReasoningEffort::default(),
            stop_sequences: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmAuth {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
}

/// Defaults applied to files created in a workspace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkspaceConfig {
    #[serde(default)]
    pub default_language: Language,
    #[serde(default = "default_placeholder_content")]
    pub placeholder_content: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            default_language: Language::default(),
            placeholder_content: default_placeholder_content(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_model() -> String { "gemini-3.1-pro-preview".to_string() }
fn default_true() -> bool { true }
fn default_timeout() -> u64 { 120 }
fn default_temperature() -> f32 { 0.7 }
fn default_top_p() -> f32 { 0.95 }
fn default_max_output_tokens() -> u32 { 8192 }
fn default_placeholder_content() -> String { "// Start coding or use AI to generate...\n".to_string() }
fn default_log_level() -> String { "info".to_string() }

impl NexusConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), NexusError> {
        if self.llm.model.trim().is_empty() {
            return Err(NexusError::ConfigError("LLM model cannot be empty".to_string()));
        }

        let temperature = self.llm.parameters.temperature;
        if !(0.0..=2.0).contains(&temperature) {
            return Err(NexusError::ConfigError(format!(
                "LLM temperature must be between 0.0 and 2.0, got {}",
                temperature
            )));
        }

        let top_p = self.llm.parameters.top_p;
        if !(0.0..=1.0).contains(&top_p) {
            return Err(NexusError::ConfigError(format!(
                "LLM top_p must be between 0.0 and 1.0, got {}",
                top_p
            )));
        }

        if let LlmProvider::Custom { base_url } = &self.llm.provider {
            if base_url.trim().is_empty() {
                return Err(NexusError::ConfigError(
                    "Custom provider requires a valid 'base_url'".to_string(),
                ));
            }
        }

        if self.llm.timeout == 0 {
            return Err(NexusError::ConfigError("LLM timeout must be greater than 0".to_string()));
        }

        Ok(())
    }
}
