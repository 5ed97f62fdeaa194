//! Bounded-concurrency role image scheduler
//!
//! A fixed pool of workers pulls build jobs from one FIFO queue in input
//! order. The first failure is stored in a single-assignment slot guarded by
//! the same lock as the queue and drains it, so a role that has not been
//! dequeued when the failure is recorded is never built. Builds already in
//! flight run to completion; their errors are logged and dropped.

use crate::assembler::ContextAssembler;
use crate::backend::ImageBackend;
use crate::config::BuilderConfig;
use crate::error::{BuildError, BuildResult};
use convenient_role::Role;
use convenient_role::naming::role_image_name;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// One role scheduled for building
#[derive(Debug, Clone)]
pub struct BuildJob {
    /// Position of the role in the input list
    pub position: usize,
    /// Role to build
    pub role: Arc<Role>,
    /// Target image name
    pub image_name: String,
}

struct DispatchState {
    pending: VecDeque<BuildJob>,
    first_error: Option<BuildError>,
}

/// Ordered work queue with a first-error slot
pub(crate) struct DispatchQueue {
    state: Mutex<DispatchState>,
}

impl DispatchQueue {
    pub(crate) fn new(jobs: impl IntoIterator<Item = BuildJob>) -> Self {
        Self {
            state: Mutex::new(DispatchState {
                pending: jobs.into_iter().collect(),
                first_error: None,
            }),
        }
    }

    /// Next job in input order, or `None` once drained or failed
    pub(crate) async fn next(&self) -> Option<BuildJob> {
        let mut state = self.state.lock().await;
        if state.first_error.is_some() {
            return None;
        }
        state.pending.pop_front()
    }

    /// Record a failure.
    ///
    /// The first failure is kept and every queued job is dropped; returns the
    /// number of dropped jobs. Later failures are discarded and yield `None`.
    pub(crate) async fn fail(&self, error: BuildError) -> Option<usize> {
        let mut state = self.state.lock().await;
        if state.first_error.is_some() {
            warn!("Discarding error after first failure: {}", error);
            return None;
        }

        let dropped = state.pending.len();
        state.pending.clear();
        error!("{}", error);
        if dropped > 0 {
            warn!("{} queued roles will not be built", dropped);
        }
        state.first_error = Some(error);
        Some(dropped)
    }

    /// Take the recorded failure, if any
    pub(crate) async fn take_error(&self) -> Option<BuildError> {
        self.state.lock().await.first_error.take()
    }
}

/// Build statistics of a successful run
#[derive(Debug, Clone, Default)]
pub struct BuildStats {
    /// Roles whose build context was assembled
    pub assembled: usize,
    /// Roles whose image was built by the backend
    pub built: usize,
    /// Wall time of the whole run
    pub duration: Duration,
}

impl fmt::Display for BuildStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} contexts assembled, {} images built in {:.2}s",
            self.assembled,
            self.built,
            self.duration.as_secs_f64()
        )
    }
}

#[derive(Debug, Default)]
struct WorkerStats {
    assembled: usize,
    built: usize,
}

/// Builds role images through an injected backend
pub struct RoleImageBuilder {
    assembler: Arc<ContextAssembler>,
    backend: Arc<dyn ImageBackend>,
}

impl RoleImageBuilder {
    /// Create a builder for the given configuration and backend
    pub fn new(config: BuilderConfig, backend: Arc<dyn ImageBackend>) -> Self {
        Self {
            assembler: Arc::new(ContextAssembler::new(Arc::new(config))),
            backend,
        }
    }

    /// The assembler used for each role
    pub fn assembler(&self) -> &ContextAssembler {
        &self.assembler
    }

    /// Assemble and build images for `roles` using `worker_count` workers.
    ///
    /// Roles are dispatched in list order. With `skip_build` the contexts are
    /// assembled but the backend is never called. Returns the first failure,
    /// attributed to its role.
    pub async fn build_role_images(
        &self,
        roles: &[Role],
        repository: &str,
        version: &str,
        skip_build: bool,
        worker_count: usize,
    ) -> BuildResult<BuildStats> {
        if worker_count < 1 {
            return Err(BuildError::Configuration(format!(
                "invalid worker count {worker_count}, at least one worker is required"
            )));
        }

        let mut names = HashSet::new();
        for role in roles {
            if !names.insert(role.name.as_str()) {
                return Err(BuildError::Configuration(format!(
                    "role {} is listed more than once",
                    role.name
                )));
            }
        }

        let start_time = Instant::now();
        let jobs = roles.iter().enumerate().map(|(position, role)| BuildJob {
            position,
            role: Arc::new(role.clone()),
            image_name: role_image_name(repository, &role.name, version),
        });
        let queue = Arc::new(DispatchQueue::new(jobs));

        let pool_size = worker_count.min(roles.len());
        info!(
            "Building {} role images with {} workers{}",
            roles.len(),
            pool_size,
            if skip_build { " (skipping image builds)" } else { "" }
        );

        let mut workers = JoinSet::new();
        for worker in 0..pool_size {
            let _ = workers.spawn(run_worker(
                worker,
                Arc::clone(&queue),
                Arc::clone(&self.assembler),
                Arc::clone(&self.backend),
                skip_build,
            ));
        }

        let mut stats = BuildStats::default();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(worker_stats) => {
                    stats.assembled += worker_stats.assembled;
                    stats.built += worker_stats.built;
                }
                Err(e) => {
                    let _ = queue
                        .fail(BuildError::Worker(e.to_string()))
                        .await;
                }
            }
        }
        stats.duration = start_time.elapsed();

        match queue.take_error().await {
            Some(error) => Err(error),
            None => {
                info!("Role image build complete: {}", stats);
                Ok(stats)
            }
        }
    }
}

async fn run_worker(
    worker: usize,
    queue: Arc<DispatchQueue>,
    assembler: Arc<ContextAssembler>,
    backend: Arc<dyn ImageBackend>,
    skip_build: bool,
) -> WorkerStats {
    let mut stats = WorkerStats::default();

    while let Some(job) = queue.next().await {
        debug!(
            "Worker {} picked role {} ({})",
            worker, job.role.name, job.image_name
        );

        match build_one(worker, &job, &assembler, backend.as_ref(), skip_build).await {
            Ok(built) => {
                stats.assembled += 1;
                if built {
                    stats.built += 1;
                }
            }
            Err(e) => {
                let _ = queue.fail(BuildError::for_role(&*job.role.name, e)).await;
            }
        }
    }

    debug!("Worker {} finished", worker);
    stats
}

/// Assemble one role and, unless skipped, build its image.
/// Returns whether the backend was invoked.
async fn build_one(
    worker: usize,
    job: &BuildJob,
    assembler: &Arc<ContextAssembler>,
    backend: &dyn ImageBackend,
    skip_build: bool,
) -> BuildResult<bool> {
    let role = Arc::clone(&job.role);
    let assembler = Arc::clone(assembler);
    let context_dir: PathBuf = tokio::task::spawn_blocking(move || assembler.assemble(&role))
        .await
        .map_err(|e| BuildError::Worker(format!("worker {worker}: {e}")))??;

    if skip_build {
        info!(
            "Skipping image build of {}, context at {}",
            job.image_name,
            context_dir.display()
        );
        return Ok(false);
    }

    backend.build_image(&context_dir, &job.image_name).await?;
    Ok(true)
}
