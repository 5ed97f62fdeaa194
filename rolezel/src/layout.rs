//! Fixed filesystem layout of a role image
//!
//! Paths are absolute container paths. The same constants are used to write
//! the build context and to reference files from the generated scripts, so
//! the two cannot drift apart.

use std::path::{Path, PathBuf};

/// Image descriptor file at the context root
pub const DOCKERFILE: &str = "Dockerfile";

/// Directory inside the context mirroring the container filesystem
pub const IMAGE_ROOT: &str = "root";

/// Runtime entry script
pub const RUN_SCRIPT: &str = "/opt/rolezel/run.sh";

/// Startup hook directory
pub const STARTUP_DIR: &str = "/opt/rolezel/startup";

/// Shared startup helpers sourced by every role hook
pub const COMMON_STARTUP_SCRIPT: &str = "/opt/rolezel/startup/common.sh";

/// License and notice files
pub const DOC_DIR: &str = "/opt/rolezel/share/doc";

/// Supervisor configuration template
pub const MONITRC_TEMPLATE: &str = "/opt/rolezel/monitrc.erb";

/// Supervised job list consumed by the supervisor configuration template
pub const SUPERVISION_SPEC: &str = "/opt/rolezel/supervision.json";

/// Rendered supervisor configuration
pub const MONITRC: &str = "/etc/monitrc";

/// Job template trees as shipped
pub const JOBS_SRC_DIR: &str = "/var/vcap/jobs-src";

/// Rendered jobs
pub const JOBS_DIR: &str = "/var/vcap/jobs";

/// Compiled packages
pub const PACKAGES_DIR: &str = "/var/vcap/packages";

/// Rendered per-job supervision descriptors
pub const MONIT_DIR: &str = "/var/vcap/monit";

/// Job spec written next to each shipped job tree
pub const JOB_SPEC_FILE: &str = "config_spec.json";

/// Per-role startup hook, e.g. `/opt/rolezel/startup/myrole.sh`
pub fn role_startup_script(role_name: &str) -> String {
    format!("{STARTUP_DIR}/{role_name}.sh")
}

/// Directory holding a role's custom startup scripts
pub fn role_scripts_dir(role_name: &str) -> String {
    format!("{STARTUP_DIR}/{role_name}")
}

/// Shipped template tree of a job
pub fn job_src_dir(job_name: &str) -> String {
    format!("{JOBS_SRC_DIR}/{job_name}")
}

/// Installed (rendered) directory of a job
pub fn job_dir(job_name: &str) -> String {
    format!("{JOBS_DIR}/{job_name}")
}

/// Run entrypoint of a job, exec'd directly by simple roles
pub fn job_run_entrypoint(job_name: &str) -> String {
    format!("{JOBS_DIR}/{job_name}/bin/run")
}

/// Map an absolute container path onto the image root of a build context
pub fn in_root(context_dir: &Path, container_path: &str) -> PathBuf {
    context_dir
        .join(IMAGE_ROOT)
        .join(container_path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_root() {
        assert_eq!(
            in_root(Path::new("/out/myrole"), RUN_SCRIPT),
            PathBuf::from("/out/myrole/root/opt/rolezel/run.sh")
        );
    }

    #[test]
    fn test_role_paths() {
        assert_eq!(role_startup_script("myrole"), "/opt/rolezel/startup/myrole.sh");
        assert_eq!(job_run_entrypoint("tor"), "/var/vcap/jobs/tor/bin/run");
        assert_eq!(job_src_dir("tor"), "/var/vcap/jobs-src/tor");
    }
}
