//! Core library for the Nexus Forge AI IDE.
//!
//! The crate owns the two pieces of the IDE that carry real invariants:
//!
//! - **Virtual workspace**: an ordered, never-empty set of in-memory files with
//!   one active file, and a composer that turns the files into a single
//!   self-contained HTML document for sandboxed preview.
//! - **Streaming aggregation**: sessions that consume incremental text
//!   fragments from a generation backend and republish the cumulative buffer,
//!   with a final result and cooperative cancellation.
//!
//! Around those sit the generation backends (Gemini over HTTP, an offline echo
//! backend), the code assistant that builds prompts and writes completed
//! results back into files, and the YAML configuration system.

pub mod assistant;
pub mod config;
pub mod errors;
pub mod llm;
pub mod stream;
pub mod workspace;

pub use assistant::{CodeAssistant, VoiceCommand};
pub use config::*;
pub use errors::NexusError;
pub use llm::{GenerationBackend, GenerationRequest};
pub use stream::{Aggregator, SessionHandle, StreamOutcome, StreamStatus};
pub use workspace::{ComposedDocument, FileId, Language, VirtualFile, Workspace};

#[cfg(test)]
pub mod test_utils;
