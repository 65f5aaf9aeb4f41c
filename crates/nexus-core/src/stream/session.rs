//! Pure state of one streaming generation session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::errors::NexusError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    Active,
    Completed,
    Failed,
    Cancelled,
}

impl StreamStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamStatus::Active)
    }
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StreamStatus::Active => "active",
            StreamStatus::Completed => "completed",
            StreamStatus::Failed => "failed",
            StreamStatus::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ss_{}", &self.0.simple().to_string()[..8])
    }
}

/// Cumulative buffer plus lifecycle status. The buffer only grows while the
/// session is active; every other status is terminal.
#[derive(Debug, Clone)]
pub struct StreamSession {
    id: SessionId,
    buffer: String,
    status: StreamStatus,
    fragments: usize,
    error: Option<NexusError>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl StreamSession {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            buffer: String::new(),
            status: StreamStatus::Active,
            fragments: 0,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn status(&self) -> StreamStatus {
        self.status
    }

    /// Text received so far. After a failure this is the partial text up to
    /// the failure point and must not be used as a result.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments
    }

    pub fn error(&self) -> Option<&NexusError> {
        self.error.as_ref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Set when the session reaches a terminal status.
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Wall time from start to the terminal transition, or to now while active.
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at.unwrap_or_else(Utc::now) - self.started_at
    }

    /// Final text, only once the session completed normally.
    pub fn final_text(&self) -> Option<&str> {
        match self.status {
            StreamStatus::Completed => Some(&self.buffer),
            _ => None,
        }
    }

    /// Appends a fragment and returns the cumulative buffer, or `None` when the
    /// session is no longer active and the fragment was discarded.
    pub fn push_fragment(&mut self, fragment: &str) -> Option<&str> {
        if self.status.is_terminal() {
            log::debug!("Session {} is {}, discarding fragment", self.id, self.status);
            return None;
        }
        self.buffer.push_str(fragment);
        self.fragments += 1;
        Some(&self.buffer)
    }

    /// Marks the session completed. Returns the final text if this call made
    /// the transition.
    pub fn complete(&mut self) -> Option<String> {
        if self.status.is_terminal() {
            return None;
        }
        self.finish(StreamStatus::Completed);
        Some(self.buffer.clone())
    }

    /// Marks the session failed, keeping the partial buffer for diagnostics.
    pub fn fail(&mut self, error: NexusError) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.finish(StreamStatus::Failed);
        self.error = Some(error);
        true
    }

    pub fn cancel(&mut self) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.finish(StreamStatus::Cancelled);
        true
    }

    fn finish(&mut self, status: StreamStatus) {
        self.status = status;
        self.finished_at = Some(Utc::now());
    }
}
