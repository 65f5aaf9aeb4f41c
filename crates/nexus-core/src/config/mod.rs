//! Configuration for the IDE core.
//!
//! Configuration is YAML on disk (`nexus.yaml` by convention) and resolves the
//! generation API key from the environment after parsing.

pub mod loader;
pub mod types;

pub use loader::*;
pub use types::*;


use crate::errors::NexusError;
use std::path::Path;

/// Load a configuration from a YAML file
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<NexusConfig, NexusError> {
    ConfigLoader::from_file(path).await
}
