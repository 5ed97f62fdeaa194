//! Role, job and package model
//!
//! The pipeline receives roles fully formed. Nothing here re-validates
//! cross-role constraints; the only derived information is [`Role::kind`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of the raw job descriptor inside a job directory.
///
/// It is build-time metadata only and never ships in an image.
pub const JOB_DESCRIPTOR_FILE: &str = "job.MF";

/// File name of the supervision descriptor inside a job directory.
pub const JOB_MONIT_FILE: &str = "monit";

/// Directory holding a job's templates, relative to the job directory.
pub const JOB_TEMPLATES_DIR: &str = "templates";

/// A release the role's jobs and packages are drawn from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Release {
    /// Release name (e.g., "tor")
    pub name: String,
    /// Release version
    #[serde(default)]
    pub version: String,
    /// Root of the extracted release; release-level license files live here
    pub path: PathBuf,
    /// Dev releases produce unattributed intermediate images
    #[serde(default)]
    pub dev: bool,
}

/// A compiled package referenced by a job
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Package {
    /// Package name; also the directory name under the compiled packages root
    pub name: String,
    /// Content fingerprint
    #[serde(default)]
    pub fingerprint: String,
    /// Package sources inside the release, searched for license files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<PathBuf>,
}

/// A single job template
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobTemplate {
    /// Template path relative to the job's `templates/` directory
    pub source: String,
    /// Rendered path relative to the installed job directory
    pub destination: String,
}

/// An installable unit of software belonging to a role
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    /// Job name (e.g., "tor")
    pub name: String,
    /// Job directory containing `templates/`, `monit` and `job.MF`
    pub path: PathBuf,
    /// Templates rendered at container start, in declared order
    #[serde(default)]
    pub templates: Vec<JobTemplate>,
    /// Packages the job depends on
    #[serde(default)]
    pub packages: Vec<Package>,
    /// Job properties, passed through to the template renderer
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl Job {
    /// Directory holding this job's templates
    pub fn templates_dir(&self) -> PathBuf {
        self.path.join(JOB_TEMPLATES_DIR)
    }

    /// Path of the raw job descriptor
    pub fn descriptor_path(&self) -> PathBuf {
        self.path.join(JOB_DESCRIPTOR_FILE)
    }
}

/// When a role runs relative to the rest of the deployment
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FlightStage {
    /// Runs before the main deployment
    PreFlight,
    /// Regular long-running role
    #[default]
    Flight,
    /// Runs after the main deployment
    PostFlight,
    /// Only started on request
    Manual,
}

/// An exposed port
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortSpec {
    /// Port name
    pub name: String,
    /// Protocol ("TCP" or "UDP")
    #[serde(default = "default_protocol")]
    pub protocol: String,
    /// Port inside the container
    pub internal: u16,
    /// Port exposed outside the container
    #[serde(default)]
    pub external: Option<u16>,
    /// Whether the port is publicly reachable
    #[serde(default)]
    pub public: bool,
}

fn default_protocol() -> String {
    "TCP".to_string()
}

/// A persistent volume
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Volume {
    /// Mount path inside the container
    pub path: String,
    /// Volume tag
    pub tag: String,
    /// Requested size in GiB
    #[serde(default)]
    pub size: u32,
}

/// Instance count bounds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scaling {
    /// Minimum instance count
    pub min: u32,
    /// Maximum instance count
    pub max: u32,
}

impl Default for Scaling {
    fn default() -> Self {
        Self { min: 1, max: 1 }
    }
}

/// Run configuration of a role
///
/// Consumed opaquely by the image pipeline except for `supervised`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    /// Flight stage
    pub flight_stage: FlightStage,
    /// Exposed ports
    pub exposed_ports: Vec<PortSpec>,
    /// Persistent volumes
    pub volumes: Vec<Volume>,
    /// Scaling bounds
    pub scaling: Scaling,
    /// Explicit supervision override; when unset the job count decides
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supervised: Option<bool>,
}

/// How a role's processes are started inside its container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleKind {
    /// A single job whose run entrypoint is exec'd directly
    Direct,
    /// One or more jobs run under a process supervisor
    Supervised,
}

/// A named, independently buildable unit destined for one container image
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Role {
    /// Role name, unique within a role list
    pub name: String,
    /// Jobs in declared order
    pub jobs: Vec<Job>,
    /// Run configuration
    #[serde(default)]
    pub run: RunConfig,
    /// Source release reference
    pub release: Release,
    /// Custom startup hook scripts, sourced in order before the role starts
    #[serde(default)]
    pub scripts: Vec<PathBuf>,
}

impl Role {
    /// Decide how this role is started.
    ///
    /// An explicit `run.supervised` wins; otherwise a role with more than one
    /// job is supervised and a single-job role execs its job directly.
    pub fn kind(&self) -> RoleKind {
        let supervised = self.run.supervised.unwrap_or(self.jobs.len() > 1);
        if supervised {
            RoleKind::Supervised
        } else {
            RoleKind::Direct
        }
    }

    /// Whether images for this role are dev (unattributed) images
    pub fn is_dev(&self) -> bool {
        self.release.dev
    }

    fn resolve_paths(&mut self, base: &Path) {
        self.release.path = rebase(base, &self.release.path);
        for script in &mut self.scripts {
            *script = rebase(base, script);
        }
        for job in &mut self.jobs {
            job.path = rebase(base, &job.path);
            for package in &mut job.packages {
                if let Some(source) = &package.source_path {
                    package.source_path = Some(rebase(base, source));
                }
            }
        }
    }
}

fn rebase(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Serialized form of an already-resolved role list
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RoleList {
    /// Roles in build order
    #[serde(default)]
    pub roles: Vec<Role>,
}

/// Load a resolved role list from a YAML file.
///
/// Relative paths inside the document are resolved against the directory
/// containing the file.
pub fn load_roles(path: impl AsRef<Path>) -> ModelResult<Vec<Role>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| ModelError::Io(path.to_path_buf(), e.to_string()))?;

    let list: RoleList = serde_yaml::from_str(&content)
        .map_err(|e| ModelError::Parse(path.to_path_buf(), e.to_string()))?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let roles: Vec<Role> = list
        .roles
        .into_iter()
        .map(|mut role| {
            role.resolve_paths(base);
            role
        })
        .collect();

    debug!("Loaded {} roles from {}", roles.len(), path.display());
    Ok(roles)
}

/// Role model error types
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// File system I/O error
    #[error("IO error reading {0}: {1}")]
    Io(PathBuf, String),

    /// YAML parsing error
    #[error("Parse error in {0}: {1}")]
    Parse(PathBuf, String),
}

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;
