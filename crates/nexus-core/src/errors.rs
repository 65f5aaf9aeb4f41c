//! Error types shared by the workspace, the generation backends and the
//! streaming sessions.
//!
//! Payloads are plain strings so the error stays `Clone`: a failed session
//! keeps its error for later inspection while also handing it to the waiter.

use crate::workspace::FileId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NexusError {
    #[error("File not found: {0}")]
    FileNotFound(FileId),
    #[error("Cannot delete {0}: a workspace must keep at least one file")]
    LastFile(FileId),
    #[error("A workspace needs at least one file")]
    EmptyWorkspace,
    #[error("Generation failed: {0}")]
    GenerationFailed(String),
    #[error("Parsing error: {0}")]
    ParsingError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("I/O error: {0}")]
    IoError(String),
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<std::io::Error> for NexusError {
    fn from(err: std::io::Error) -> Self {
        NexusError::IoError(err.to_string())
    }
}

impl From<reqwest::Error> for NexusError {
    fn from(err: reqwest::Error) -> Self {
        NexusError::GenerationFailed(err.to_string())
    }
}
