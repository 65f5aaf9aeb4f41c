//! Streaming aggregation of generation fragments.

pub mod aggregator;
pub mod session;

pub use aggregator::{Aggregator, SessionCanceller, SessionHandle, StreamOutcome};
pub use session::{SessionId, StreamSession, StreamStatus};
