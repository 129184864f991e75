//! # Build Orchestrator
//!
//! Preprocess and compile notes, one at a time or as a bounded parallel
//! batch.
//!
//! ## Batch pipeline
//!
//! ```text
//!  headers ──► work queue (capacity = batch) ──► W workers ──► results queue ──► collector
//!                                                   │                             ▲
//!                                                   └──── supervisor (join all) ──┘ closes
//! ```
//!
//! - Each worker takes the next slug, checks cancellation, then runs the
//!   single-note path in a task of its own. One worker owns a job from start
//!   to finish; a job that panics is reported failed and the worker moves on.
//! - The supervisor holds the last results sender and drops it only after
//!   every worker has been joined, so the collector sees exactly one result
//!   per submitted job before the stream ends.
//! - Cancellation is cooperative: it is checked before each job starts. A
//!   compiler process that is already running finishes normally.

mod types;

pub use types::{BatchReport, BuildProgress, BuildResult, JobState};

use crate::compiler::Compiler;
use crate::config::DEFAULT_WORKERS;
use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use texvault_core::{Preprocessor, Repository, VaultError, VaultLayout};

// =============================================================================
// CANCELLATION
// =============================================================================

/// Cooperative cancellation with a reason.
///
/// Clones share state. The first reason given wins.
#[derive(Debug, Clone, Default)]
pub struct BuildCancel {
    token: CancellationToken,
    reason: Arc<OnceLock<String>>,
}

impl BuildCancel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of every job that has not started yet.
    pub fn cancel(&self, reason: impl Into<String>) {
        let _ = self.reason.set(reason.into());
        self.token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Reason given to [`cancel`](Self::cancel).
    #[must_use]
    pub fn reason(&self) -> &str {
        self.reason.get().map_or("cancelled", String::as_str)
    }

    /// Resolves once cancellation has been requested.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}

// =============================================================================
// ORCHESTRATOR
// =============================================================================

/// Runs the preprocess → compile pipeline.
///
/// Cheap to clone; every worker holds its own handle.
#[derive(Clone)]
pub struct BuildOrchestrator {
    repo: Arc<dyn Repository>,
    preprocessor: Arc<Preprocessor>,
    compiler: Arc<dyn Compiler>,
    workers: usize,
    extra_env: Arc<Vec<(String, String)>>,
}

impl BuildOrchestrator {
    /// Orchestrator with the default pool size and no extra environment.
    pub fn new(
        repo: Arc<dyn Repository>,
        preprocessor: Preprocessor,
        compiler: Arc<dyn Compiler>,
    ) -> Self {
        Self {
            repo,
            preprocessor: Arc::new(preprocessor),
            compiler,
            workers: DEFAULT_WORKERS,
            extra_env: Arc::new(Vec::new()),
        }
    }

    /// Orchestrator wired to a vault layout: staging under the cache
    /// directory and `TEXINPUTS` covering notes and assets.
    pub fn for_layout(
        layout: &VaultLayout,
        repo: Arc<dyn Repository>,
        compiler: Arc<dyn Compiler>,
    ) -> Self {
        let preprocessor =
            Preprocessor::new(Arc::clone(&repo), &layout.notes_dir, layout.staging_dir());
        Self::new(repo, preprocessor, compiler).with_extra_env(texinputs(layout))
    }

    /// Pool size; values below 1 are raised to 1.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Environment added to every compiler invocation.
    #[must_use]
    pub fn with_extra_env(mut self, env: Vec<(String, String)>) -> Self {
        self.extra_env = Arc::new(env);
        self
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Build one note. Never fails: errors are carried in the result.
    pub async fn build_one(&self, slug: &str) -> BuildResult {
        let started = Instant::now();
        tracing::debug!(slug = %slug, state = %JobState::Preprocessing, "job started");

        let preprocessor = Arc::clone(&self.preprocessor);
        let owned = slug.to_string();
        let staged = match tokio::task::spawn_blocking(move || preprocessor.process(&owned)).await
        {
            Ok(Ok(path)) => path,
            Ok(Err(e)) => {
                tracing::warn!(slug = %slug, error = %e, "preprocessing failed");
                return BuildResult::failed(slug, JobState::Preprocessing, &e, elapsed(started));
            }
            Err(e) => {
                let err = VaultError::Io(format!("preprocessing task aborted: {}", e));
                return BuildResult::failed(slug, JobState::Preprocessing, &err, elapsed(started));
            }
        };

        tracing::debug!(
            slug = %slug,
            state = %JobState::Compiling,
            compiler = self.compiler.name(),
            "job compiling"
        );
        match self.compiler.compile(&staged, &self.extra_env).await {
            Ok(()) => {
                let output = self.compiler.output_path(slug);
                tracing::info!(slug = %slug, output = %output.display(), "note built");
                BuildResult::succeeded(slug, output, elapsed(started))
            }
            Err(e) => {
                tracing::warn!(slug = %slug, error = %e, "compilation failed");
                BuildResult::failed(slug, JobState::Compiling, &e, elapsed(started))
            }
        }
    }

    /// Build every note in the repository.
    ///
    /// Only a failure to enumerate the notes is an error.
    pub async fn build_all(&self, cancel: &BuildCancel) -> Result<BatchReport, VaultError> {
        self.run_batch(cancel, None).await
    }

    /// [`build_all`](Self::build_all), plus one event per finished job on
    /// `progress`. The sender is dropped when the batch ends, which closes
    /// the stream.
    pub async fn build_all_with_progress(
        &self,
        cancel: &BuildCancel,
        progress: mpsc::Sender<BuildProgress>,
    ) -> Result<BatchReport, VaultError> {
        self.run_batch(cancel, Some(progress)).await
    }

    async fn run_batch(
        &self,
        cancel: &BuildCancel,
        mut progress: Option<mpsc::Sender<BuildProgress>>,
    ) -> Result<BatchReport, VaultError> {
        let repo = Arc::clone(&self.repo);
        let headers = tokio::task::spawn_blocking(move || repo.list_headers())
            .await
            .map_err(|e| VaultError::Io(format!("note enumeration aborted: {}", e)))??;

        let total = headers.len();
        let capacity = total.max(1);
        let mut pending: BTreeSet<String> = BTreeSet::new();

        let (work_tx, work_rx) = mpsc::channel::<String>(capacity);
        for header in headers {
            pending.insert(header.slug.clone());
            work_tx
                .send(header.slug)
                .await
                .map_err(|_| VaultError::Io("work queue closed".to_string()))?;
        }
        drop(work_tx);
        let work_rx = Arc::new(Mutex::new(work_rx));

        let (result_tx, mut result_rx) = mpsc::channel::<BuildResult>(capacity);
        let pool = self.workers.min(total);
        tracing::info!(notes = total, workers = pool, "batch build started");

        let mut workers = JoinSet::new();
        for id in 0..pool {
            let worker = WorkerContext {
                id,
                orchestrator: self.clone(),
                work: Arc::clone(&work_rx),
                results: result_tx.clone(),
                cancel: cancel.clone(),
            };
            workers.spawn(worker.run());
        }

        let supervisor = tokio::spawn(async move {
            while let Some(joined) = workers.join_next().await {
                if let Err(e) = joined {
                    tracing::error!("build worker crashed: {e}");
                }
            }
            drop(result_tx);
        });

        let mut results = Vec::with_capacity(total);
        while let Some(result) = result_rx.recv().await {
            pending.remove(&result.slug);
            report_progress(&mut progress, &result, results.len() + 1, total).await;
            results.push(result);
        }
        if let Err(e) = supervisor.await {
            tracing::error!("build supervisor crashed: {e}");
        }

        // Last resort: a worker that died outside a job leaves slugs unreported.
        for slug in pending {
            let err = VaultError::Io("build worker exited before reporting".to_string());
            let result = BuildResult::failed(slug, JobState::Queued, &err, 0);
            report_progress(&mut progress, &result, results.len() + 1, total).await;
            results.push(result);
        }

        let report = BatchReport::from_results(results);
        tracing::info!(
            total = report.total,
            succeeded = report.succeeded,
            failed = report.failed,
            cancelled = report.cancelled(),
            "batch build finished"
        );
        Ok(report)
    }
}

// =============================================================================
// WORKER
// =============================================================================

struct WorkerContext {
    id: usize,
    orchestrator: BuildOrchestrator,
    work: Arc<Mutex<mpsc::Receiver<String>>>,
    results: mpsc::Sender<BuildResult>,
    cancel: BuildCancel,
}

impl WorkerContext {
    async fn run(self) {
        loop {
            let next = self.work.lock().await.recv().await;
            let Some(slug) = next else { break };

            let result = if self.cancel.is_cancelled() {
                tracing::debug!(worker = self.id, slug = %slug, "skipping cancelled job");
                BuildResult::cancelled(slug, self.cancel.reason())
            } else {
                self.run_job(slug).await
            };

            if self.results.send(result).await.is_err() {
                tracing::warn!(worker = self.id, "results queue closed early");
                break;
            }
        }
        tracing::debug!(worker = self.id, "worker drained");
    }

    /// Run one job in its own task so a crash costs only that job.
    async fn run_job(&self, slug: String) -> BuildResult {
        let started = Instant::now();
        let orchestrator = self.orchestrator.clone();
        let job_slug = slug.clone();
        let job = tokio::spawn(async move { orchestrator.build_one(&job_slug).await });

        match job.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(worker = self.id, slug = %slug, "build job crashed: {e}");
                let err = VaultError::Io(format!("build job crashed: {}", e));
                BuildResult::failed(slug, JobState::Compiling, &err, elapsed(started))
            }
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

async fn report_progress(
    progress: &mut Option<mpsc::Sender<BuildProgress>>,
    result: &BuildResult,
    current: usize,
    total: usize,
) {
    let Some(sender) = progress else { return };
    let event = BuildProgress {
        current,
        total,
        slug: result.slug.clone(),
        success: result.success,
        error: result.error.clone(),
    };
    if sender.send(event).await.is_err() {
        tracing::debug!("progress receiver dropped");
        *progress = None;
    }
}

fn elapsed(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// `TEXINPUTS` listing notes and assets, keeping the default search path.
pub fn texinputs(layout: &VaultLayout) -> Vec<(String, String)> {
    let sep = if cfg!(windows) { ";" } else { ":" };
    let value = format!(
        "{}{sep}{}{sep}",
        layout.notes_dir.display(),
        layout.assets_dir.display()
    );
    vec![("TEXINPUTS".to_string(), value)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_keeps_first_reason() {
        let cancel = BuildCancel::new();
        assert!(!cancel.is_cancelled());
        assert_eq!(cancel.reason(), "cancelled");

        let clone = cancel.clone();
        clone.cancel("interrupted");
        cancel.cancel("second");
        assert!(cancel.is_cancelled());
        assert_eq!(cancel.reason(), "interrupted");
    }

    #[test]
    fn texinputs_lists_notes_and_assets() {
        let layout = VaultLayout::new("/vault");
        let env = texinputs(&layout);
        assert_eq!(env.len(), 1);
        assert_eq!(env[0].0, "TEXINPUTS");
        assert!(env[0].1.contains("notes"));
        assert!(env[0].1.contains("assets"));
    }
}
