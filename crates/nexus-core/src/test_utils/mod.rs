// src/test_utils/mod.rs
pub mod mock_gemini_server;

use async_stream::stream;
use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::mpsc;

use crate::errors::NexusError;
use crate::llm::{fragments, FragmentStream, GenerationBackend, GenerationRequest};

/// Replays a fixed list of fragments, or refuses to dispatch at all.
pub struct ScriptedBackend {
    script: Result<Vec<Result<String, NexusError>>, NexusError>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedBackend {
    pub fn new(items: Vec<Result<String, NexusError>>) -> Self {
        Self {
            script: Ok(items),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn fragments(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|text| Ok(text.to_string())).collect())
    }

    pub fn failing_dispatch(error: NexusError) -> Self {
        Self {
            script: Err(error),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream(&self, request: GenerationRequest) -> Result<FragmentStream, NexusError> {
        self.requests.lock().unwrap().push(request);
        match &self.script {
            Ok(items) => Ok(fragments::from_results(items.clone())),
            Err(error) => Err(error.clone()),
        }
    }
}

/// Emits whatever the test pushes through the paired sender. Dropping the
/// sender ends the stream normally.
pub struct ChannelBackend {
    receiver: Mutex<Option<mpsc::UnboundedReceiver<Result<String, NexusError>>>>,
}

impl ChannelBackend {
    pub fn new() -> (Self, mpsc::UnboundedSender<Result<String, NexusError>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                receiver: Mutex::new(Some(rx)),
            },
            tx,
        )
    }
}

#[async_trait]
impl GenerationBackend for ChannelBackend {
    fn name(&self) -> &str {
        "channel"
    }

    async fn stream(&self, _request: GenerationRequest) -> Result<FragmentStream, NexusError> {
        let mut rx = self
            .receiver
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| NexusError::InternalError("channel backend already used".into()))?;

        Ok(fragments::boxed(stream! {
            while let Some(item) = rx.recv().await {
                yield item;
            }
        }))
    }
}
