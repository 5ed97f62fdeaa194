//! Build context assembly
//!
//! Produces, for one role, the directory handed to the image backend:
//!
//! ```text
//! <output_dir>/<role>/
//!   Dockerfile
//!   root/
//!     opt/rolezel/run.sh
//!     opt/rolezel/startup/{common.sh, <role>.sh, <role>/<custom scripts>}
//!     opt/rolezel/share/doc/<release>/...      (license files)
//!     var/vcap/jobs-src/<job>/...              (job tree without job.MF)
//!     var/vcap/packages/<package>/...          (compiled artifacts)
//! ```
//!
//! The context directory is recreated on every attempt. A failed attempt may
//! leave a partial directory behind; removing it is up to the caller.

use crate::config::BuilderConfig;
use crate::generator::{self, ArtifactGenerator, GenerateError};
use crate::layout;
use convenient_role::model::JOB_DESCRIPTOR_FILE;
use convenient_role::naming::{self, NamingError};
use convenient_role::{Package, Role, RoleKind};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

/// File name prefixes (lowercase) that mark license and notice files
const LICENSE_PREFIXES: &[&str] = &["license", "licence", "copying", "notice"];

/// Errors that can occur during context assembly
#[derive(Debug, thiserror::Error)]
pub enum AssembleError {
    /// Role, job or package name is not a safe directory name
    #[error(transparent)]
    Naming(#[from] NamingError),

    /// Artifact generation failed
    #[error("Failed to generate artifacts: {0}")]
    Generate(#[from] GenerateError),

    /// Filesystem operation failed
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory walk failed
    #[error("WalkDir error: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// Job directory does not exist
    #[error("Job directory of {job} not found: {path:?}")]
    MissingJobDir { job: String, path: PathBuf },

    /// No compiled package directory for a referenced package
    #[error("Compiled package {package} not found at {path:?}")]
    MissingPackage { package: String, path: PathBuf },

    /// Custom startup script does not exist
    #[error("Startup script of role {role} not found: {path:?}")]
    MissingScript { role: String, path: PathBuf },
}

/// Result type for assembly
pub type AssembleResult<T> = Result<T, AssembleError>;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> AssembleError + '_ {
    move |source| AssembleError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Assembles role build contexts below the configured output directory
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    config: Arc<BuilderConfig>,
}

impl ContextAssembler {
    /// Create an assembler sharing the given configuration
    pub fn new(config: Arc<BuilderConfig>) -> Self {
        Self { config }
    }

    /// Builder configuration
    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Deterministic context directory of a role
    pub fn context_dir(&self, role: &Role) -> AssembleResult<PathBuf> {
        Ok(self.config.output_dir.join(naming::role_dir_name(&role.name)?))
    }

    /// Assemble the build context of a role and return its directory
    #[instrument(skip_all, fields(role = %role.name))]
    pub fn assemble(&self, role: &Role) -> AssembleResult<PathBuf> {
        let context_dir = self.context_dir(role)?;
        check_component_names(role)?;
        info!("Assembling build context in {}", context_dir.display());

        recreate_dir(&context_dir)?;

        let generator = ArtifactGenerator::new(&self.config);
        write_file(
            &context_dir.join(layout::DOCKERFILE),
            &generator.image_descriptor(role)?,
            false,
        )?;
        write_file(
            &layout::in_root(&context_dir, layout::RUN_SCRIPT),
            &generator.run_script(role)?,
            true,
        )?;

        self.copy_jobs(role, &context_dir, &generator)?;
        let packages = distinct_packages(role);
        self.copy_packages(&packages, &context_dir)?;
        self.copy_licenses(role, &packages, &context_dir)?;
        self.write_startup(role, &context_dir, &generator)?;

        debug!("Build context for {} complete", role.name);
        Ok(context_dir)
    }

    fn copy_jobs(
        &self,
        role: &Role,
        context_dir: &Path,
        generator: &ArtifactGenerator<'_>,
    ) -> AssembleResult<()> {
        for job in &role.jobs {
            if !job.path.is_dir() {
                return Err(AssembleError::MissingJobDir {
                    job: job.name.clone(),
                    path: job.path.clone(),
                });
            }

            let dest = layout::in_root(context_dir, &layout::job_src_dir(&job.name));
            let descriptor = Path::new(JOB_DESCRIPTOR_FILE);
            let copied = copy_tree(&job.path, &dest, |rel| rel == descriptor)?;
            write_file(&dest.join(layout::JOB_SPEC_FILE), &generator.job_spec(job)?, false)?;

            debug!("Copied job {} ({} files)", job.name, copied);
        }
        Ok(())
    }

    fn copy_packages(&self, packages: &[&Package], context_dir: &Path) -> AssembleResult<()> {
        let packages_dir = layout::in_root(context_dir, layout::PACKAGES_DIR);

        for package in packages {
            let src = self.compiled_package_dir(package);
            if !src.is_dir() {
                return Err(AssembleError::MissingPackage {
                    package: package.name.clone(),
                    path: src,
                });
            }

            let copied = copy_tree(&src, &packages_dir.join(&package.name), |_| false)?;
            debug!("Copied package {} ({} files)", package.name, copied);
        }
        Ok(())
    }

    fn copy_licenses(
        &self,
        role: &Role,
        packages: &[&Package],
        context_dir: &Path,
    ) -> AssembleResult<()> {
        let release_doc_dir =
            layout::in_root(context_dir, layout::DOC_DIR).join(&role.release.name);

        // Release-level licenses sit at the top of the release
        if role.release.path.is_dir() {
            let entries = fs::read_dir(&role.release.path).map_err(io_error(&role.release.path))?;
            for entry in entries {
                let entry = entry.map_err(io_error(&role.release.path))?;
                let path = entry.path();
                if path.is_file() && is_license_file(&path) {
                    copy_file(&path, &release_doc_dir.join(entry.file_name()))?;
                }
            }
        } else {
            debug!(
                "Release {} has no directory at {}, skipping release licenses",
                role.release.name,
                role.release.path.display()
            );
        }

        // Package licenses keep their path relative to the package root
        for package in packages {
            let root = package
                .source_path
                .clone()
                .unwrap_or_else(|| self.compiled_package_dir(package));
            if !root.is_dir() {
                continue;
            }

            for entry in WalkDir::new(&root) {
                let entry = entry?;
                if !entry.file_type().is_file() || !is_license_file(entry.path()) {
                    continue;
                }
                let Ok(rel) = entry.path().strip_prefix(&root) else {
                    continue;
                };
                copy_file(entry.path(), &release_doc_dir.join(&package.name).join(rel))?;
            }
        }
        Ok(())
    }

    fn write_startup(
        &self,
        role: &Role,
        context_dir: &Path,
        generator: &ArtifactGenerator<'_>,
    ) -> AssembleResult<()> {
        write_file(
            &layout::in_root(context_dir, layout::COMMON_STARTUP_SCRIPT),
            generator::COMMON_STARTUP_SCRIPT,
            true,
        )?;

        let scripts_dir = layout::in_root(context_dir, &layout::role_scripts_dir(&role.name));
        for script in &role.scripts {
            if !script.is_file() {
                return Err(AssembleError::MissingScript {
                    role: role.name.clone(),
                    path: script.clone(),
                });
            }
            let name = generator::script_file_name(role, script)?;
            copy_file(script, &scripts_dir.join(name))?;
        }

        write_file(
            &layout::in_root(context_dir, &layout::role_startup_script(&role.name)),
            &generator.startup_script(role)?,
            true,
        )?;

        if role.kind() == RoleKind::Supervised {
            write_file(
                &layout::in_root(context_dir, layout::MONITRC_TEMPLATE),
                generator::MONITRC_TEMPLATE,
                false,
            )?;
        }
        Ok(())
    }

    fn compiled_package_dir(&self, package: &Package) -> PathBuf {
        self.config.compiled_packages_dir.join(&package.name)
    }
}

/// Job and package names become directories inside the context
fn check_component_names(role: &Role) -> AssembleResult<()> {
    for job in &role.jobs {
        let _ = naming::component_name("job", &job.name)?;
        for package in &job.packages {
            let _ = naming::component_name("package", &package.name)?;
        }
    }
    Ok(())
}

/// Packages of all jobs in first-seen order, one entry per package name
fn distinct_packages(role: &Role) -> Vec<&Package> {
    let mut seen: HashMap<&str, &str> = HashMap::new();
    let mut packages = Vec::new();

    for package in role.jobs.iter().flat_map(|job| &job.packages) {
        match seen.get(package.name.as_str()) {
            Some(fingerprint) => {
                if *fingerprint != package.fingerprint {
                    warn!(
                        "Duplicate package {} in role {}, using fingerprint {}",
                        package.name, role.name, fingerprint
                    );
                }
            }
            None => {
                let _ = seen.insert(&package.name, &package.fingerprint);
                packages.push(package);
            }
        }
    }
    packages
}

fn is_license_file(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
        .is_some_and(|name| LICENSE_PREFIXES.iter().any(|p| name.starts_with(p)))
}

fn recreate_dir(dir: &Path) -> AssembleResult<()> {
    if dir.exists() {
        debug!("Removing previous build context {}", dir.display());
        fs::remove_dir_all(dir).map_err(io_error(dir))?;
    }
    fs::create_dir_all(dir).map_err(io_error(dir))
}

fn ensure_parent(path: &Path) -> AssembleResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    Ok(())
}

fn write_file(path: &Path, contents: &str, executable: bool) -> AssembleResult<()> {
    ensure_parent(path)?;
    fs::write(path, contents).map_err(io_error(path))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if executable {
            fs::set_permissions(path, fs::Permissions::from_mode(0o755))
                .map_err(io_error(path))?;
        }
    }
    #[cfg(not(unix))]
    let _ = executable;

    Ok(())
}

fn copy_file(src: &Path, dst: &Path) -> AssembleResult<()> {
    ensure_parent(dst)?;
    let _ = fs::copy(src, dst).map_err(io_error(src))?;
    Ok(())
}

/// Copy a directory tree, skipping every entry whose path relative to `src`
/// matches `exclude` (a skipped directory is skipped with its contents).
/// Symlinks are recreated rather than followed on unix.
fn copy_tree(src: &Path, dst: &Path, exclude: impl Fn(&Path) -> bool) -> AssembleResult<usize> {
    let mut copied = 0;
    let walker = WalkDir::new(src).into_iter().filter_entry(|entry| {
        entry
            .path()
            .strip_prefix(src)
            .map(|rel| rel.as_os_str().is_empty() || !exclude(rel))
            .unwrap_or(true)
    });

    for entry in walker {
        let entry = entry?;
        let Ok(rel) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dst.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(io_error(&target))?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
            copied += 1;
        } else {
            copy_file(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> AssembleResult<()> {
    ensure_parent(dst)?;
    let link = fs::read_link(src).map_err(io_error(src))?;
    std::os::unix::fs::symlink(&link, dst).map_err(io_error(dst))
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> AssembleResult<()> {
    copy_file(src, dst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use convenient_role::{Job, Release, RunConfig};
    use std::collections::BTreeMap;
    use tempfile::TempDir;
    use tracing_test::traced_test;

    fn package(name: &str, fingerprint: &str) -> Package {
        Package {
            name: name.to_string(),
            fingerprint: fingerprint.to_string(),
            source_path: None,
        }
    }

    fn job(name: &str, packages: Vec<Package>) -> Job {
        Job {
            name: name.to_string(),
            path: PathBuf::from("/nonexistent").join(name),
            templates: Vec::new(),
            packages,
            properties: BTreeMap::new(),
        }
    }

    fn role(jobs: Vec<Job>) -> Role {
        Role {
            name: "myrole".to_string(),
            jobs,
            run: RunConfig::default(),
            release: Release {
                name: "tor".to_string(),
                version: "1".to_string(),
                path: PathBuf::from("/nonexistent"),
                dev: false,
            },
            scripts: Vec::new(),
        }
    }

    #[test]
    fn test_distinct_packages_keeps_first_seen_order() {
        let role = role(vec![
            job("a", vec![package("libevent", "1"), package("tor", "2")]),
            job("b", vec![package("tor", "2"), package("openssl", "3")]),
        ]);
        let names: Vec<&str> = distinct_packages(&role)
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["libevent", "tor", "openssl"]);
    }

    #[traced_test]
    #[test]
    fn test_conflicting_duplicate_package_warns() {
        let role = role(vec![
            job("a", vec![package("tor", "first")]),
            job("b", vec![package("tor", "second")]),
        ]);
        let packages = distinct_packages(&role);

        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].fingerprint, "first");
        assert!(logs_contain("Duplicate package tor in role myrole"));
    }

    #[test]
    fn test_is_license_file() {
        assert!(is_license_file(Path::new("LICENSE")));
        assert!(is_license_file(Path::new("a/b/LICENSE.txt")));
        assert!(is_license_file(Path::new("Licence.md")));
        assert!(is_license_file(Path::new("COPYING")));
        assert!(is_license_file(Path::new("NOTICE")));
        assert!(!is_license_file(Path::new("README.md")));
        assert!(!is_license_file(Path::new("src/unlicensed.c")));
    }

    #[test]
    fn test_copy_tree_excludes_top_level_only() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("job.MF"), "name: tor").unwrap();
        fs::write(src.join("monit"), "check process tor").unwrap();
        fs::write(src.join("nested/job.MF"), "kept").unwrap();

        let dst = temp.path().join("dst");
        let exclude = Path::new("job.MF");
        let copied = copy_tree(&src, &dst, |rel| rel == exclude).unwrap();

        assert_eq!(copied, 2);
        assert!(!dst.join("job.MF").exists());
        assert!(dst.join("monit").is_file());
        assert!(dst.join("nested/job.MF").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_tree_preserves_symlinks() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("libfoo.so.1"), "elf").unwrap();
        std::os::unix::fs::symlink("libfoo.so.1", src.join("libfoo.so")).unwrap();

        let dst = temp.path().join("dst");
        let _ = copy_tree(&src, &dst, |_| false).unwrap();

        let link = fs::read_link(dst.join("libfoo.so")).unwrap();
        assert_eq!(link, PathBuf::from("libfoo.so.1"));
    }

    #[test]
    fn test_recreate_dir_discards_previous_content() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("myrole");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("stale"), "old").unwrap();

        recreate_dir(&dir).unwrap();
        assert!(dir.is_dir());
        assert!(!dir.join("stale").exists());
    }
}
