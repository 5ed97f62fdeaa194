//! Image descriptor and script generation
//!
//! Everything here is a pure function of a role and the builder
//! configuration, apart from the check that each job's template directory
//! exists. Dynamic values are shell-quoted before they reach script text.

use crate::config::BuilderConfig;
use crate::layout;
use convenient_role::naming::{self, NamingError, base_image_name};
use convenient_role::{Job, Role, RoleKind};
use serde::Serialize;
use std::borrow::Cow;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Template renderer invoked by the run script
const RENDERER: &str = "configgin";

/// Heredoc delimiter for embedded documents
const HEREDOC_END: &str = "ROLEZEL_EOF";

/// Supervisor configuration template shipped with supervised roles
pub const MONITRC_TEMPLATE: &str = r#"set daemon 10
set logfile /var/vcap/sys/log/monit.log
set httpd port 2289 and use address 127.0.0.1
  allow localhost

<% templates.each do |template| -%>
include /var/vcap/monit/<%= template['name'] %>.monit
<% end -%>
"#;

/// Helpers shared by every role's startup hook
pub const COMMON_STARTUP_SCRIPT: &str = r#"#!/bin/bash
# Shared helpers for role startup hooks
set -o pipefail

# wait_for_file PATH [TIMEOUT_SECONDS]
wait_for_file() {
  local path="$1" timeout="${2:-60}"
  local waited=0
  while [[ ! -e "$path" ]]; do
    if (( waited >= timeout )); then
      echo "Timed out waiting for $path" >&2
      return 1
    fi
    sleep 1
    waited=$(( waited + 1 ))
  done
}
"#;

/// Errors that can occur while generating role artifacts
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    /// Role has an empty name
    #[error("Role name is missing")]
    MissingRoleName,

    /// Role declares no jobs
    #[error("Role {0} has no jobs")]
    NoJobs(String),

    /// Direct role without exactly one job
    #[error("Role {role} starts its job directly but has {count} jobs")]
    DirectJobCount { role: String, count: usize },

    /// Job directory lacks `templates/`
    #[error("Template directory of job {job} (role {role}) not found: {path:?}")]
    MissingTemplateDir {
        role: String,
        job: String,
        path: PathBuf,
    },

    /// Job name is not usable as an installed directory
    #[error(transparent)]
    Naming(#[from] NamingError),

    /// Custom startup script path ends without a file name
    #[error("Startup script path of role {role} has no file name: {path:?}")]
    InvalidScriptPath { role: String, path: PathBuf },

    /// JSON document could not be serialized
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Writing into the output buffer failed
    #[error("Formatting failed: {0}")]
    Format(#[from] std::fmt::Error),
}

/// Result type for generation
pub type GenerateResult<T> = Result<T, GenerateError>;

#[derive(Serialize)]
struct SupervisedTemplate<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct SupervisionSpec<'a> {
    role: &'a str,
    templates: Vec<SupervisedTemplate<'a>>,
}

#[derive(Serialize)]
struct JobSpec<'a> {
    job: JobSpecHeader<'a>,
    packages: Vec<&'a str>,
    properties: &'a std::collections::BTreeMap<String, serde_json::Value>,
}

#[derive(Serialize)]
struct JobSpecHeader<'a> {
    name: &'a str,
    templates: &'a [convenient_role::JobTemplate],
}

/// Renders the text artifacts of a role build context
pub struct ArtifactGenerator<'a> {
    config: &'a BuilderConfig,
}

impl<'a> ArtifactGenerator<'a> {
    /// Create a generator for the given configuration
    pub fn new(config: &'a BuilderConfig) -> Self {
        Self { config }
    }

    /// Generate the image descriptor (Dockerfile) of a role.
    ///
    /// Release images carry a maintainer label; dev images (dev config or dev
    /// release) do not. Both carry the `role`/`version` label pair.
    pub fn image_descriptor(&self, role: &Role) -> GenerateResult<String> {
        require_name(role)?;

        let mut out = String::new();
        writeln!(
            out,
            "FROM {}",
            base_image_name(&self.config.repository, &self.config.base_image_version)
        )?;
        writeln!(out)?;

        if !(self.config.dev || role.is_dev()) {
            writeln!(out, "LABEL \"maintainer\"={}", json_quote(&self.config.maintainer)?)?;
            writeln!(out)?;
        }

        writeln!(
            out,
            "LABEL \"role\"={} \"version\"={}",
            json_quote(&role.name)?,
            json_quote(&self.config.version)?
        )?;
        writeln!(out)?;
        writeln!(out, "ADD {} /", layout::IMAGE_ROOT)?;
        writeln!(out)?;
        writeln!(
            out,
            "ENTRYPOINT {}",
            serde_json::to_string(&["/bin/bash", layout::RUN_SCRIPT])?
        )?;

        debug!("Generated image descriptor for {} ({} bytes)", role.name, out.len());
        Ok(out)
    }

    /// Generate the runtime entry script of a role.
    ///
    /// Direct roles exec their single job's run entrypoint. Supervised roles
    /// render the supervisor configuration and start the supervisor.
    pub fn run_script(&self, role: &Role) -> GenerateResult<String> {
        require_name(role)?;
        if role.jobs.is_empty() {
            return Err(GenerateError::NoJobs(role.name.clone()));
        }
        let kind = role.kind();
        if kind == RoleKind::Direct && role.jobs.len() != 1 {
            return Err(GenerateError::DirectJobCount {
                role: role.name.clone(),
                count: role.jobs.len(),
            });
        }
        for job in &role.jobs {
            let _ = naming::component_name("job", &job.name)?;
            let templates_dir = job.templates_dir();
            if !templates_dir.is_dir() {
                return Err(GenerateError::MissingTemplateDir {
                    role: role.name.clone(),
                    job: job.name.clone(),
                    path: templates_dir,
                });
            }
        }

        let mut out = String::new();
        writeln!(out, "#!/bin/bash")?;
        writeln!(out, "# Entry script for role {}", role.name)?;
        writeln!(out, "set -e")?;
        writeln!(out)?;
        writeln!(out, "if [[ \"${{1:-}}\" == \"--help\" ]]; then")?;
        writeln!(out, "  echo \"Usage: {}\"", layout::RUN_SCRIPT)?;
        writeln!(out, "  exit 0")?;
        writeln!(out, "fi")?;
        writeln!(out)?;
        writeln!(out, "export PATH=/var/vcap/bosh/bin:$PATH")?;
        writeln!(out, "export ROLEZEL_ROLE={}", quote(&role.name))?;
        writeln!(out)?;

        writeln!(out, "# Render job templates")?;
        for job in &role.jobs {
            for template in &job.templates {
                let input = format!(
                    "{}/templates/{}",
                    layout::job_src_dir(&job.name),
                    template.source
                );
                let output = format!("{}/{}", layout::job_dir(&job.name), template.destination);
                self.render(&mut out, role, Some(job), &input, &output, &job_spec_path(job))?;
            }
        }
        writeln!(out)?;

        if kind == RoleKind::Supervised {
            writeln!(out, "# Render supervision descriptors")?;
            writeln!(out, "mkdir -p {}", layout::MONIT_DIR)?;
            for job in &role.jobs {
                let input = format!(
                    "{}/{}",
                    layout::job_src_dir(&job.name),
                    convenient_role::model::JOB_MONIT_FILE
                );
                let output = format!("{}/{}.monit", layout::MONIT_DIR, job.name);
                self.render(&mut out, role, Some(job), &input, &output, &job_spec_path(job))?;
            }
            writeln!(out)?;
        }

        writeln!(out, "# Role startup hooks")?;
        writeln!(out, "source {}", quote(&layout::role_startup_script(&role.name)))?;
        writeln!(out)?;

        match kind {
            RoleKind::Direct => {
                let job = &role.jobs[0];
                writeln!(out, "exec {}", quote(&layout::job_run_entrypoint(&job.name)))?;
            }
            RoleKind::Supervised => {
                writeln!(out, "# Supervised jobs")?;
                writeln!(
                    out,
                    "cat > {} <<'{}'",
                    layout::SUPERVISION_SPEC,
                    HEREDOC_END
                )?;
                writeln!(out, "{}", supervision_spec(role)?)?;
                writeln!(out, "{HEREDOC_END}")?;
                writeln!(out)?;
                self.render(
                    &mut out,
                    role,
                    None,
                    layout::MONITRC_TEMPLATE,
                    layout::MONITRC,
                    layout::SUPERVISION_SPEC,
                )?;
                writeln!(out, "chmod 0600 {}", layout::MONITRC)?;
                writeln!(out)?;
                writeln!(out, "exec monit -vI")?;
            }
        }

        debug!(
            "Generated {:?} run script for {} ({} bytes)",
            kind,
            role.name,
            out.len()
        );
        Ok(out)
    }

    /// Generate the per-role startup hook.
    ///
    /// It sources the shared helpers, then each custom role script in order.
    pub fn startup_script(&self, role: &Role) -> GenerateResult<String> {
        require_name(role)?;

        let mut out = String::new();
        writeln!(out, "#!/bin/bash")?;
        writeln!(out, "# Startup hooks for role {}", role.name)?;
        writeln!(out, "source {}", layout::COMMON_STARTUP_SCRIPT)?;
        for script in &role.scripts {
            let name = script_file_name(role, script)?;
            let path = format!("{}/{}", layout::role_scripts_dir(&role.name), name);
            writeln!(out, "source {}", quote(&path))?;
        }
        Ok(out)
    }

    /// Generate the JSON job spec shipped next to a job's template tree
    pub fn job_spec(&self, job: &Job) -> GenerateResult<String> {
        let spec = JobSpec {
            job: JobSpecHeader {
                name: &job.name,
                templates: &job.templates,
            },
            packages: job.packages.iter().map(|p| p.name.as_str()).collect(),
            properties: &job.properties,
        };
        Ok(serde_json::to_string_pretty(&spec)?)
    }

    fn render(
        &self,
        out: &mut String,
        role: &Role,
        job: Option<&Job>,
        input: &str,
        output: &str,
        base: &str,
    ) -> GenerateResult<()> {
        writeln!(out, "{RENDERER} \\")?;
        writeln!(out, "  --input-erb {} \\", quote(input))?;
        writeln!(out, "  --output {} \\", quote(output))?;
        writeln!(out, "  --base {} \\", quote(base))?;
        writeln!(
            out,
            "  --store {} --prefix {} \\",
            quote(&self.config.config_store_address),
            quote(&self.config.config_store_prefix)
        )?;
        match job {
            Some(job) => writeln!(
                out,
                "  --role {} --job {}",
                quote(&role.name),
                quote(&job.name)
            )?,
            None => writeln!(out, "  --role {}", quote(&role.name))?,
        }
        Ok(())
    }
}

/// File name a custom startup script is shipped under
pub(crate) fn script_file_name(role: &Role, script: &Path) -> GenerateResult<String> {
    script
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| GenerateError::InvalidScriptPath {
            role: role.name.clone(),
            path: script.to_path_buf(),
        })
}

fn job_spec_path(job: &Job) -> String {
    format!("{}/{}", layout::job_src_dir(&job.name), layout::JOB_SPEC_FILE)
}

fn supervision_spec(role: &Role) -> GenerateResult<String> {
    let spec = SupervisionSpec {
        role: &role.name,
        templates: role
            .jobs
            .iter()
            .map(|job| SupervisedTemplate { name: &job.name })
            .collect(),
    };
    Ok(serde_json::to_string(&spec)?)
}

fn require_name(role: &Role) -> GenerateResult<()> {
    if role.name.trim().is_empty() {
        return Err(GenerateError::MissingRoleName);
    }
    Ok(())
}

fn json_quote(value: &str) -> GenerateResult<String> {
    Ok(serde_json::to_string(value)?)
}

fn quote(value: &str) -> Cow<'_, str> {
    shell_escape::unix::escape(Cow::Borrowed(value))
}
