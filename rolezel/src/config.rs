//! Builder configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Immutable configuration shared by every stage of a role image build.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BuilderConfig {
    /// Image repository prefix (e.g., "acme" gives "acme-<role>:<version>")
    pub repository: String,
    /// Root of the compiled packages, one directory per package name
    pub compiled_packages_dir: PathBuf,
    /// Root below which one build context per role is created
    pub output_dir: PathBuf,
    /// Address of the configuration store the template renderer reads from
    pub config_store_address: String,
    /// Key prefix inside the configuration store
    pub config_store_prefix: String,
    /// Deployment version written into image labels
    pub version: String,
    /// Tag of the role base image
    pub base_image_version: String,
    /// Build unattributed dev images
    pub dev: bool,
    /// Maintainer recorded in release images
    pub maintainer: String,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            repository: String::new(),
            compiled_packages_dir: PathBuf::new(),
            output_dir: PathBuf::new(),
            config_store_address: "http://127.0.0.1:8500".to_string(),
            config_store_prefix: "rolezel".to_string(),
            version: String::new(),
            base_image_version: String::new(),
            dev: false,
            maintainer: "Rolezel Contributors".to_string(),
        }
    }
}

impl BuilderConfig {
    /// Create a configuration with the required fields set
    pub fn new(
        repository: impl Into<String>,
        compiled_packages_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        version: impl Into<String>,
        base_image_version: impl Into<String>,
    ) -> Self {
        Self {
            repository: repository.into(),
            compiled_packages_dir: compiled_packages_dir.into(),
            output_dir: output_dir.into(),
            version: version.into(),
            base_image_version: base_image_version.into(),
            ..Self::default()
        }
    }

    /// Set the configuration store address and key prefix
    pub fn with_config_store(mut self, address: impl Into<String>, prefix: impl Into<String>) -> Self {
        self.config_store_address = address.into();
        self.config_store_prefix = prefix.into();
        self
    }

    /// Build dev images
    pub fn with_dev(mut self, dev: bool) -> Self {
        self.dev = dev;
        self
    }

    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e.to_string()))?;
        serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e.to_string()))
    }

    /// Check that every required field is set
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.repository.trim().is_empty() {
            return Err(ConfigError::Missing("repository"));
        }
        if self.compiled_packages_dir.as_os_str().is_empty() {
            return Err(ConfigError::Missing("compiled_packages_dir"));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::Missing("output_dir"));
        }
        if self.base_image_version.trim().is_empty() {
            return Err(ConfigError::Missing("base_image_version"));
        }
        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("IO error reading {0}: {1}")]
    Io(PathBuf, String),

    /// Configuration file is not valid YAML for [`BuilderConfig`]
    #[error("Parse error in {0}: {1}")]
    Parse(PathBuf, String),

    /// Required field left empty
    #[error("Missing required configuration: {0}")]
    Missing(&'static str),
}
