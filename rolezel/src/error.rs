//! Error types for rolezel.
//!
//! Each stage has its own error enum; [`BuildError`] is what the pipeline
//! reports to callers.

use crate::assembler::AssembleError;
use crate::backend::BackendError;
use crate::config::ConfigError;
use crate::generator::GenerateError;
use thiserror::Error;

/// Result type alias for pipeline operations.
pub type BuildResult<T> = std::result::Result<T, BuildError>;

/// Main error type of the role image pipeline.
#[derive(Error, Debug)]
pub enum BuildError {
    /// Invalid scheduler input (worker count, duplicate roles)
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Builder configuration could not be loaded or is incomplete
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Artifact generation failed
    #[error(transparent)]
    Generate(#[from] GenerateError),

    /// Build context assembly failed
    #[error(transparent)]
    Assemble(#[from] AssembleError),

    /// Image backend failed
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// A worker task panicked or was cancelled
    #[error("Build worker stopped unexpectedly: {0}")]
    Worker(String),

    /// Failure attributed to the role whose build produced it
    #[error("Failed to build role {role}: {source}")]
    Role {
        role: String,
        #[source]
        source: Box<BuildError>,
    },
}

impl BuildError {
    /// Attribute an error to the role whose build produced it
    pub fn for_role(role: impl Into<String>, source: BuildError) -> Self {
        Self::Role {
            role: role.into(),
            source: Box::new(source),
        }
    }

    /// Name of the failing role, if the error is attributed to one
    pub fn role(&self) -> Option<&str> {
        match self {
            Self::Role { role, .. } => Some(role),
            _ => None,
        }
    }
}
