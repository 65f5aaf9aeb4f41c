//! Drives a generation backend and republishes the cumulative buffer.
//!
//! Each call to [`Aggregator::start_stream`] spawns one task that owns the
//! fragment stream. The observer is called with the whole text received so
//! far after every fragment, in order. The final outcome is delivered once,
//! through [`SessionHandle::wait`].
//!
//! Cancellation is cooperative: [`SessionHandle::cancel`] marks the session
//! cancelled before the task sees it, so no fragment is appended afterwards.
//! An observer call already in flight when `cancel` runs may still finish.

use futures_util::StreamExt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use super::session::{SessionId, StreamSession, StreamStatus};
use crate::errors::NexusError;
use crate::llm::{FragmentStream, GenerationBackend, GenerationRequest};

/// How a session ended, when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed(String),
    Cancelled,
}

impl StreamOutcome {
    pub fn into_text(self) -> Option<String> {
        match self {
            StreamOutcome::Completed(text) => Some(text),
            StreamOutcome::Cancelled => None,
        }
    }
}

type SharedSession = Arc<Mutex<StreamSession>>;

fn lock(state: &SharedSession) -> MutexGuard<'_, StreamSession> {
    // The session holds plain data; a panicked observer must not wedge it.
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Requests cancellation of one session. Cheap to clone and hand to signal
/// handlers.
#[derive(Clone)]
pub struct SessionCanceller {
    state: SharedSession,
    token: CancellationToken,
}

impl SessionCanceller {
    /// Returns `true` if the session was still active.
    pub fn cancel(&self) -> bool {
        let cancelled = lock(&self.state).cancel();
        self.token.cancel();
        cancelled
    }
}

/// Owner of a running session. Dropping the handle before the session ends
/// cancels it; keep the handle (or call [`SessionHandle::wait`]) for as long
/// as the result matters.
pub struct SessionHandle {
    id: SessionId,
    canceller: SessionCanceller,
    outcome: Option<oneshot::Receiver<Result<StreamOutcome, NexusError>>>,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn status(&self) -> StreamStatus {
        lock(&self.canceller.state).status()
    }

    /// Snapshot of the cumulative buffer.
    pub fn buffer(&self) -> String {
        lock(&self.canceller.state).buffer().to_string()
    }

    /// Stops the session. A no-op once it has reached a terminal status.
    pub fn cancel(&self) -> bool {
        self.canceller.cancel()
    }

    pub fn canceller(&self) -> SessionCanceller {
        self.canceller.clone()
    }

    /// Waits for the session to finish. Failures carry the backend error;
    /// the partial buffer stays readable through [`SessionHandle::buffer`]
    /// until this call consumes the handle.
    pub async fn wait(mut self) -> Result<StreamOutcome, NexusError> {
        let outcome = self.outcome.take().ok_or_else(|| {
            NexusError::InternalError(format!("Session {} already waited on", self.id))
        })?;
        outcome
            .await
            .map_err(|_| NexusError::InternalError(format!("Session {} task dropped", self.id)))?
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if self.canceller.cancel() {
            log::debug!("Session {} handle dropped, cancelling", self.id);
        }
    }
}

#[derive(Clone)]
pub struct Aggregator {
    backend: Arc<dyn GenerationBackend>,
}

impl Aggregator {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn GenerationBackend> {
        &self.backend
    }

    /// Starts a session and returns immediately. Must be called from within a
    /// tokio runtime.
    pub fn start_stream<F>(&self, request: GenerationRequest, on_update: F) -> SessionHandle
    where
        F: FnMut(&str) + Send + 'static,
    {
        let id = SessionId::new();
        let state: SharedSession = Arc::new(Mutex::new(StreamSession::new(id)));
        let token = CancellationToken::new();
        let (tx, rx) = oneshot::channel();

        log::info!(
            "Starting session {} ({:?}) on backend {}",
            id,
            request.task,
            self.backend.name()
        );

        let backend = self.backend.clone();
        let task_state = state.clone();
        let task_token = token.clone();
        tokio::spawn(async move {
            let outcome = run_session(backend, request, &task_state, &task_token, on_update).await;
            let elapsed_ms = lock(&task_state).elapsed().num_milliseconds();
            match &outcome {
                Ok(StreamOutcome::Completed(text)) => log::info!(
                    "Session {} completed with {} bytes in {}ms",
                    id,
                    text.len(),
                    elapsed_ms
                ),
                Ok(StreamOutcome::Cancelled) => log::info!("Session {} cancelled after {}ms", id, elapsed_ms),
                Err(e) => log::warn!("Session {} failed after {}ms: {}", id, elapsed_ms, e),
            }
            // The handle may have been dropped without waiting.
            let _ = tx.send(outcome);
        });

        SessionHandle {
            id,
            canceller: SessionCanceller { state, token },
            outcome: Some(rx),
        }
    }

    /// Runs a session to completion and returns the final text.
    pub async fn generate(&self, request: GenerationRequest) -> Result<String, NexusError> {
        match self.start_stream(request, |_| {}).wait().await? {
            StreamOutcome::Completed(text) => Ok(text),
            StreamOutcome::Cancelled => Err(NexusError::InternalError(
                "Generation cancelled".to_string(),
            )),
        }
    }
}

async fn run_session<F>(
    backend: Arc<dyn GenerationBackend>,
    request: GenerationRequest,
    state: &SharedSession,
    token: &CancellationToken,
    mut on_update: F,
) -> Result<StreamOutcome, NexusError>
where
    F: FnMut(&str) + Send + 'static,
{
    let dispatched = tokio::select! {
        biased;
        _ = token.cancelled() => return Ok(StreamOutcome::Cancelled),
        result = backend.stream(request) => result,
    };

    let mut fragments: FragmentStream = match dispatched {
        Ok(stream) => stream,
        Err(e) => return fail(state, e),
    };

    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(StreamOutcome::Cancelled),
            next = fragments.next() => next,
        };

        match next {
            Some(Ok(fragment)) => {
                let snapshot = {
                    let mut session = lock(state);
                    match session.push_fragment(&fragment) {
                        Some(buffer) => buffer.to_string(),
                        None => return Ok(StreamOutcome::Cancelled),
                    }
                };
                on_update(&snapshot);
            }
            Some(Err(e)) => return fail(state, e),
            None => {
                return Ok(match lock(state).complete() {
                    Some(text) => StreamOutcome::Completed(text),
                    None => StreamOutcome::Cancelled,
                });
            }
        }
    }
}

fn fail(state: &SharedSession, error: NexusError) -> Result<StreamOutcome, NexusError> {
    if lock(state).fail(error.clone()) {
        Err(error)
    } else {
        Ok(StreamOutcome::Cancelled)
    }
}
