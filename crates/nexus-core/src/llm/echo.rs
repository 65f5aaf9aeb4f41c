//! Offline backend that streams the prompt back, one word per fragment.
//! Useful for exercising the UI without network access or an API key.

use async_stream::stream;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;

use super::{FragmentStream, GenerationBackend, GenerationMode, GenerationRequest};
use crate::errors::NexusError;

#[derive(Debug, Clone, Default)]
pub struct EchoBackend {
    chunk_delay: Duration,
}

impl EchoBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }
}

#[async_trait]
impl GenerationBackend for EchoBackend {
    fn name(&self) -> &str {
        "echo"
    }

    async fn stream(&self, request: GenerationRequest) -> Result<FragmentStream, NexusError> {
        if request.mode == GenerationMode::OneShot {
            return Ok(super::fragments::single(request.prompt));
        }

        let delay = self.chunk_delay;
        let words: Vec<String> = request
            .prompt
            .split_inclusive(char::is_whitespace)
            .map(str::to_string)
            .collect();

        Ok(Box::pin(stream! {
            for word in words {
                yield Ok::<String, NexusError>(word);
                if !delay.is_zero() {
                    sleep(delay).await;
                }
            }
        }))
    }
}
