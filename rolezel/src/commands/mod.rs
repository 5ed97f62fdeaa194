//! Rolezel command-line interface
//!
//! - `build`: assemble every role's context and build its image
//! - `context`: assemble contexts only
//! - `show`: print one generated artifact of a role

use clap::{Args, Parser, Subcommand, ValueEnum};
use rolezel::{BuilderConfig, ConfigError, Role, load_roles};
use std::path::PathBuf;

pub mod build;
pub mod context;
pub mod show;

/// Rolezel - build container images for deployment roles
#[derive(Parser)]
#[command(name = "rolezel")]
#[command(about = "Build container images for deployment roles")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Assemble build contexts and build all role images
    Build {
        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Assemble build contexts without building images
    Context {
        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Print a generated artifact of one role
    Show {
        #[command(flatten)]
        settings: Settings,

        /// Role name
        role: String,

        /// Artifact to print
        #[arg(short, long, value_enum, default_value_t = Artifact::Dockerfile)]
        artifact: Artifact,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Artifact {
    Dockerfile,
    RunScript,
    StartupScript,
}

/// Role list and configuration shared by every command
#[derive(Args, Debug)]
pub struct Settings {
    /// Resolved role list (YAML)
    #[arg(short, long, env = "ROLEZEL_ROLES", default_value = "roles.yml")]
    pub roles: PathBuf,

    /// Builder configuration file (YAML)
    #[arg(short, long, env = "ROLEZEL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Image repository prefix
    #[arg(long, env = "ROLEZEL_REPOSITORY")]
    pub repository: Option<String>,

    /// Deployment version written into image labels and tags
    #[arg(long = "image-version", env = "ROLEZEL_VERSION")]
    pub version: Option<String>,

    /// Tag of the role base image
    #[arg(long, env = "ROLEZEL_BASE_IMAGE_VERSION")]
    pub base_image_version: Option<String>,

    /// Directory holding compiled packages
    #[arg(long, env = "ROLEZEL_COMPILED_PACKAGES")]
    pub compiled_packages: Option<PathBuf>,

    /// Directory receiving one build context per role
    #[arg(short, long, env = "ROLEZEL_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Configuration store address used by the template renderer
    #[arg(long, env = "ROLEZEL_CONFIG_STORE_ADDRESS")]
    pub config_store_address: Option<String>,

    /// Key prefix inside the configuration store
    #[arg(long, env = "ROLEZEL_CONFIG_STORE_PREFIX")]
    pub config_store_prefix: Option<String>,

    /// Build dev images
    #[arg(long)]
    pub dev: bool,
}

impl Settings {
    /// File configuration with command line overrides applied
    pub fn builder_config(&self) -> Result<BuilderConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => BuilderConfig::load(path)?,
            None => BuilderConfig::default(),
        };

        if let Some(repository) = &self.repository {
            config.repository = repository.clone();
        }
        if let Some(version) = &self.version {
            config.version = version.clone();
        }
        if let Some(base_image_version) = &self.base_image_version {
            config.base_image_version = base_image_version.clone();
        }
        if let Some(dir) = &self.compiled_packages {
            config.compiled_packages_dir = dir.clone();
        }
        if let Some(dir) = &self.output {
            config.output_dir = dir.clone();
        }
        if let Some(address) = &self.config_store_address {
            config.config_store_address = address.clone();
        }
        if let Some(prefix) = &self.config_store_prefix {
            config.config_store_prefix = prefix.clone();
        }
        config.dev |= self.dev;

        Ok(config)
    }

    /// Load the role list
    pub fn roles(&self) -> Result<Vec<Role>, Box<dyn std::error::Error>> {
        Ok(load_roles(&self.roles)?)
    }
}

/// Options of the commands that run the pipeline
#[derive(Args, Debug)]
pub struct PipelineArgs {
    #[command(flatten)]
    pub settings: Settings,

    /// Number of concurrent role builds
    #[arg(short = 'j', long, env = "ROLEZEL_WORKERS", default_value_t = num_cpus::get())]
    pub workers: usize,

    /// Only build these roles (repeatable)
    #[arg(long = "role")]
    pub only: Vec<String>,

    /// Docker-compatible client used to build images
    #[arg(long, env = "ROLEZEL_DOCKER", default_value = "docker")]
    pub docker: PathBuf,

    /// Extra arguments passed to every image build
    #[arg(long = "docker-arg", allow_hyphen_values = true)]
    pub docker_args: Vec<String>,
}

impl PipelineArgs {
    /// Roles selected for this run, in list order
    pub fn selected_roles(&self) -> Result<Vec<Role>, Box<dyn std::error::Error>> {
        let roles = self.settings.roles()?;
        if self.only.is_empty() {
            return Ok(roles);
        }

        for name in &self.only {
            if !roles.iter().any(|role| &role.name == name) {
                return Err(format!("Unknown role: {name}").into());
            }
        }
        Ok(roles
            .into_iter()
            .filter(|role| self.only.contains(&role.name))
            .collect())
    }
}
