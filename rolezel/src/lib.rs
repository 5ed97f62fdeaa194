//! Rolezel - role image build pipeline
//!
//! Turns an already-resolved role model (see `convenient-role`) into one
//! container build context per role and hands each context to an image
//! backend:
//!
//! 1. **Generation** ([`generator`]): image descriptor, run script, startup
//!    script and job specs as text
//! 2. **Assembly** ([`assembler`]): the on-disk build context below
//!    `<output_dir>/<role>`
//! 3. **Backend** ([`backend`]): turns a context into a named image
//! 4. **Scheduling** ([`scheduler`]): a bounded worker pool with fail-fast
//!    semantics
//!
//! ## Usage
//!
//! ```no_run
//! use rolezel::*;
//! use std::sync::Arc;
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BuilderConfig::load("rolezel.yml")?;
//! config.validate()?;
//! let roles = load_roles("roles.yml")?;
//!
//! let builder = RoleImageBuilder::new(config.clone(), Arc::new(DockerCliBackend::default()));
//! let stats = builder
//!     .build_role_images(&roles, &config.repository, &config.version, false, 4)
//!     .await?;
//! println!("{stats}");
//! # Ok(())
//! # }
//! ```

pub mod assembler;
pub mod backend;
pub mod config;
pub mod error;
pub mod generator;
pub mod layout;
pub mod scheduler;

pub use assembler::{AssembleError, AssembleResult, ContextAssembler};
pub use backend::{BackendError, DockerCliBackend, ImageBackend};
pub use config::{BuilderConfig, ConfigError};
pub use error::{BuildError, BuildResult};
pub use generator::{ArtifactGenerator, GenerateError, GenerateResult};
pub use scheduler::{BuildJob, BuildStats, RoleImageBuilder};

// Re-export the role model
pub use convenient_role::{Job, Package, Release, Role, RoleKind, load_roles};
