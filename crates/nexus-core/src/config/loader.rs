//! Configuration loader for YAML files and environment resolution

use crate::config::types::*;
use crate::errors::NexusError;
use std::env;
use std::path::Path;
use tokio::fs;

/// Environment variable consulted when no key is configured.
pub const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Configuration loader with environment resolution
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<NexusConfig, NexusError> {
        let path = path.as_ref();

        let content = fs::read_to_string(path).await.map_err(|e| {
            NexusError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        log::debug!("Loaded configuration file {}", path.display());
        Self::from_str(&content)
    }

    /// Load configuration from an optional file, falling back to defaults
    /// (with environment resolution) when no path is given.
    pub async fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<NexusConfig, NexusError> {
        match path {
            Some(path) => Self::from_file(path).await,
            None => {
                let mut config = NexusConfig::default();
                Self::resolve_llm_auth(&mut config.llm.auth);
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Load configuration from a YAML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<NexusConfig, NexusError> {
        // An empty document means "all defaults".
        let mut config: NexusConfig = if content.trim().is_empty() {
            NexusConfig::default()
        } else {
            serde_yaml::from_str(content)
                .map_err(|e| NexusError::ConfigError(format!("Failed to parse YAML config: {}", e)))?
        };

        Self::resolve_llm_auth(&mut config.llm.auth);
        config.validate()?;

        Ok(config)
    }

    /// Resolve the API key: an explicit key wins, then the variable named by
    /// `api_key_env`, then `GEMINI_API_KEY`.
    fn resolve_llm_auth(auth: &mut LlmAuth) {
        if auth.api_key.is_some() {
            return;
        }

        if let Some(env_var) = &auth.api_key_env {
            match env::var(env_var) {
                Ok(api_key) => auth.api_key = Some(api_key),
                Err(_) => log::warn!("Environment variable {} for the API key is not set", env_var),
            }
            return;
        }

        if let Ok(api_key) = env::var(DEFAULT_API_KEY_ENV) {
            auth.api_key = Some(api_key);
        }
    }
}
