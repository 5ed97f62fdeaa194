//! Image build backends
//!
//! The scheduler only needs `build(context_dir, image_name)`. Backends are
//! handed to the scheduler as a capability, which lets tests substitute a
//! double for the real container tooling.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

/// Number of trailing stderr lines kept for error reports
const STDERR_TAIL_LINES: usize = 20;

/// Errors reported by an image backend
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Backend program could not be started
    #[error("Failed to start {program:?}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Image build ran and failed
    #[error("Building image {image} failed: {reason}")]
    Failed { image: String, reason: String },
}

/// Something that turns a build context directory into a named image.
///
/// Implementations must tolerate concurrent calls for distinct image names.
#[async_trait]
pub trait ImageBackend: Send + Sync {
    /// Build `context_dir` into an image called `image_name`
    async fn build_image(&self, context_dir: &Path, image_name: &str) -> Result<(), BackendError>;
}

/// Backend driving the `docker` command line client
#[derive(Debug, Clone)]
pub struct DockerCliBackend {
    program: PathBuf,
    extra_args: Vec<String>,
}

impl Default for DockerCliBackend {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl DockerCliBackend {
    /// Use the given docker-compatible client binary
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            extra_args: Vec::new(),
        }
    }

    /// Pass additional arguments to every `build` invocation
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }
}

#[async_trait]
impl ImageBackend for DockerCliBackend {
    async fn build_image(&self, context_dir: &Path, image_name: &str) -> Result<(), BackendError> {
        info!("Building image {} from {}", image_name, context_dir.display());

        let mut child = Command::new(&self.program)
            .arg("build")
            .args(&self.extra_args)
            .arg("--tag")
            .arg(image_name)
            .arg(context_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| BackendError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let forward_stdout = async {
            if let Some(stdout) = stdout {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(image = image_name, "{}", line);
                }
            }
        };
        let collect_stderr = async {
            let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
            if let Some(stderr) = stderr {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(image = image_name, stderr = true, "{}", line);
                    if tail.len() == STDERR_TAIL_LINES {
                        let _ = tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }
            tail
        };

        let ((), tail) = tokio::join!(forward_stdout, collect_stderr);
        let status = child.wait().await.map_err(|e| BackendError::Failed {
            image: image_name.to_string(),
            reason: format!("waiting for {} failed: {}", self.program.display(), e),
        })?;

        if status.success() {
            info!("Built image {}", image_name);
            Ok(())
        } else {
            let details: Vec<String> = tail.into_iter().collect();
            Err(BackendError::Failed {
                image: image_name.to_string(),
                reason: format!("{}\n{}", status, details.join("\n")),
            })
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let backend = DockerCliBackend::new("/nonexistent/docker");
        let err = backend
            .build_image(Path::new("/tmp"), "foo-myrole:1.0")
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_failure() {
        // `false` ignores its arguments and exits 1
        let backend = DockerCliBackend::new("false");
        let err = backend
            .build_image(Path::new("/tmp"), "foo-myrole:1.0")
            .await
            .unwrap_err();
        match err {
            BackendError::Failed { image, .. } => assert_eq!(image, "foo-myrole:1.0"),
            other => panic!("Expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_zero_exit_is_success() {
        let backend = DockerCliBackend::new("true").with_args(["--quiet"]);
        backend
            .build_image(Path::new("/tmp"), "foo-myrole:1.0")
            .await
            .unwrap();
    }
}
