//! Integration tests for the build orchestrator.
//!
//! The compiler is replaced by in-process fakes so no TeX installation is
//! needed; preprocessing runs for real against an in-memory repository.

#![allow(clippy::unwrap_used, clippy::panic)]

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use texvault::build::{BuildCancel, BuildOrchestrator, BuildProgress, JobState};
use texvault::compiler::Compiler;
use texvault_core::{
    MemoryRepository, Note, NoteHeader, Preprocessor, Repository, VaultError, normalize,
};
use tokio::sync::mpsc;

// =============================================================================
// FAKES
// =============================================================================

/// Records calls, fails or panics for chosen slugs, optionally cancels on
/// first call.
#[derive(Default)]
struct FakeCompiler {
    output_dir: PathBuf,
    fail: BTreeSet<String>,
    panic_on: BTreeSet<String>,
    delay: Duration,
    cancel_on_first: Option<BuildCancel>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeCompiler {
    fn new(output_dir: &Path) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            ..Self::default()
        }
    }

    fn failing(mut self, slug: &str) -> Self {
        self.fail.insert(slug.to_string());
        self
    }

    fn panicking(mut self, slug: &str) -> Self {
        self.panic_on.insert(slug.to_string());
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn cancelling(mut self, cancel: BuildCancel) -> Self {
        self.cancel_on_first = Some(cancel);
        self
    }
}

#[async_trait]
impl Compiler for FakeCompiler {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn compile(
        &self,
        staged: &Path,
        extra_env: &[(String, String)],
    ) -> Result<(), VaultError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            if let Some(cancel) = &self.cancel_on_first {
                cancel.cancel("stop after first");
            }
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        assert!(staged.is_file(), "compiler runs after preprocessing");
        assert!(extra_env.iter().any(|(k, _)| k == "TEXINPUTS"));

        let stem = staged.file_stem().and_then(|s| s.to_str()).unwrap();
        let slug = normalize(stem);
        if self.panic_on.contains(&slug) {
            panic!("compiler bug while building {slug}");
        }
        if self.fail.contains(&slug) {
            return Err(VaultError::CompileFailure {
                code: Some(1),
                output: format!("! Undefined control sequence in {}", slug),
            });
        }
        Ok(())
    }

    fn output_path(&self, slug: &str) -> PathBuf {
        self.output_dir.join(format!("{}.pdf", slug))
    }
}

/// Repository whose `get` fails for one slug.
struct FlakyRepository {
    inner: MemoryRepository,
    broken: &'static str,
}

impl Repository for FlakyRepository {
    fn list_headers(&self) -> Result<Vec<NoteHeader>, VaultError> {
        self.inner.list_headers()
    }
    fn get(&self, slug: &str) -> Result<Note, VaultError> {
        if slug == self.broken {
            return Err(VaultError::Io("disk error".to_string()));
        }
        self.inner.get(slug)
    }
    fn exists(&self, slug: &str) -> bool {
        self.inner.exists(slug)
    }
    fn save(&self, note: &Note) -> Result<(), VaultError> {
        self.inner.save(note)
    }
    fn delete(&self, slug: &str) -> Result<(), VaultError> {
        self.inner.delete(slug)
    }
}

/// Repository that cannot enumerate.
struct DownRepository;

impl Repository for DownRepository {
    fn list_headers(&self) -> Result<Vec<NoteHeader>, VaultError> {
        Err(VaultError::Io("notes directory unavailable".to_string()))
    }
    fn get(&self, slug: &str) -> Result<Note, VaultError> {
        Err(VaultError::NotFound(slug.to_string()))
    }
    fn exists(&self, _slug: &str) -> bool {
        false
    }
    fn save(&self, _note: &Note) -> Result<(), VaultError> {
        Ok(())
    }
    fn delete(&self, _slug: &str) -> Result<(), VaultError> {
        Ok(())
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn corpus(count: usize) -> MemoryRepository {
    let repo = MemoryRepository::new();
    for i in 0..count {
        let next = (i + 1) % count.max(1);
        repo.insert(&format!("note{i:02}"), &format!(r"See \ref{{note{next:02}}}"))
            .unwrap();
    }
    repo
}

fn orchestrator(
    repo: Arc<dyn Repository>,
    staging: &Path,
    compiler: Arc<FakeCompiler>,
    workers: usize,
) -> BuildOrchestrator {
    let preprocessor = Preprocessor::new(Arc::clone(&repo), "/vault/notes", staging);
    BuildOrchestrator::new(repo, preprocessor, compiler)
        .with_workers(workers)
        .with_extra_env(vec![("TEXINPUTS".to_string(), "/vault/notes:".to_string())])
}

async fn drain(mut rx: mpsc::Receiver<BuildProgress>) -> Vec<BuildProgress> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

// =============================================================================
// SINGLE NOTE
// =============================================================================

#[tokio::test]
async fn build_one_reports_compiler_output_path() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Arc::new(corpus(2));
    let compiler = Arc::new(FakeCompiler::new(&dir.path().join("pdf")));
    let orch = orchestrator(repo, &dir.path().join("staging"), compiler.clone(), 1);

    let result = orch.build_one("note00").await;

    assert!(result.success);
    assert_eq!(result.state, JobState::Succeeded);
    assert_eq!(result.output_path, Some(compiler.output_path("note00")));
    let staged = std::fs::read_to_string(dir.path().join("staging/note00.tex")).unwrap();
    assert!(staged.contains(r"\href{./note01.pdf}{note01}"));
}

#[tokio::test]
async fn build_one_missing_note_skips_compiler() {
    let dir = tempfile::tempdir().unwrap();
    let compiler = Arc::new(FakeCompiler::new(dir.path()));
    let orch = orchestrator(
        Arc::new(MemoryRepository::new()),
        &dir.path().join("staging"),
        compiler.clone(),
        1,
    );

    let result = orch.build_one("ghost").await;

    assert!(!result.success);
    assert_eq!(result.failed_stage, Some(JobState::Preprocessing));
    assert!(result.error.unwrap().contains("ghost"));
    assert_eq!(compiler.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn build_one_compile_failure_keeps_log() {
    let dir = tempfile::tempdir().unwrap();
    let compiler = Arc::new(FakeCompiler::new(dir.path()).failing("note01"));
    let orch = orchestrator(Arc::new(corpus(2)), &dir.path().join("s"), compiler, 1);

    let result = orch.build_one("note01").await;

    assert_eq!(result.state, JobState::Failed);
    assert_eq!(result.failed_stage, Some(JobState::Compiling));
    assert!(result.compiler_output.unwrap().contains("Undefined control sequence"));
}

// =============================================================================
// BATCH
// =============================================================================

#[tokio::test]
async fn ten_notes_four_workers() {
    let dir = tempfile::tempdir().unwrap();
    let compiler = Arc::new(FakeCompiler::new(dir.path()));
    let orch = orchestrator(Arc::new(corpus(10)), &dir.path().join("s"), compiler, 4);

    let report = orch.build_all(&BuildCancel::new()).await.unwrap();

    assert_eq!(report.total, 10);
    assert_eq!(report.succeeded + report.failed, 10);
    assert_eq!(report.results.len(), 10);
}

#[tokio::test]
async fn every_slug_reported_exactly_once() {
    for (notes, workers) in [(0, 1), (1, 1), (3, 8), (17, 2), (25, 5)] {
        let dir = tempfile::tempdir().unwrap();
        let compiler = Arc::new(FakeCompiler::new(dir.path()));
        let orch = orchestrator(Arc::new(corpus(notes)), &dir.path().join("s"), compiler, workers);

        let report = orch.build_all(&BuildCancel::new()).await.unwrap();

        let slugs: Vec<_> = report.results.iter().map(|r| r.slug.clone()).collect();
        let unique: BTreeSet<_> = slugs.iter().cloned().collect();
        assert_eq!(slugs.len(), notes, "notes={notes} workers={workers}");
        assert_eq!(unique.len(), notes, "notes={notes} workers={workers}");
    }
}

#[tokio::test]
async fn failures_do_not_abort_siblings() {
    let dir = tempfile::tempdir().unwrap();
    let inner = corpus(6);
    let repo = Arc::new(FlakyRepository {
        inner,
        broken: "note02",
    });
    let compiler = Arc::new(FakeCompiler::new(dir.path()).failing("note04"));
    let orch = orchestrator(repo, &dir.path().join("s"), compiler, 3);

    let report = orch.build_all(&BuildCancel::new()).await.unwrap();

    assert_eq!(report.total, 6);
    assert_eq!(report.succeeded, 4);
    assert_eq!(report.failed, 2);

    let stage_of = |slug: &str| {
        report
            .results
            .iter()
            .find(|r| r.slug == slug)
            .and_then(|r| r.failed_stage)
    };
    assert_eq!(stage_of("note02"), Some(JobState::Preprocessing));
    assert_eq!(stage_of("note04"), Some(JobState::Compiling));
    assert_eq!(stage_of("note00"), None);
}

#[tokio::test]
async fn panicking_job_fails_alone() {
    for workers in [1, 2, 4] {
        let dir = tempfile::tempdir().unwrap();
        let compiler = Arc::new(
            FakeCompiler::new(dir.path())
                .panicking("note03")
                .panicking("note07"),
        );
        let orch = orchestrator(
            Arc::new(corpus(10)),
            &dir.path().join("s"),
            compiler.clone(),
            workers,
        );

        let report = orch.build_all(&BuildCancel::new()).await.unwrap();

        assert_eq!(report.total, 10, "workers={workers}");
        assert_eq!(report.succeeded, 8, "workers={workers}");
        let failed: BTreeSet<_> = report
            .results
            .iter()
            .filter(|r| !r.success)
            .map(|r| r.slug.as_str())
            .collect();
        assert_eq!(failed, BTreeSet::from(["note03", "note07"]), "workers={workers}");
        assert!(
            report
                .results
                .iter()
                .filter(|r| !r.success)
                .all(|r| r.error.as_deref().is_some_and(|e| e.contains("crashed")))
        );
        assert_eq!(compiler.calls.load(Ordering::SeqCst), 10, "workers={workers}");
    }
}

#[tokio::test]
async fn all_failing_still_reports_totals() {
    let dir = tempfile::tempdir().unwrap();
    let compiler = Arc::new(
        FakeCompiler::new(dir.path())
            .failing("note00")
            .failing("note01"),
    );
    let orch = orchestrator(Arc::new(corpus(2)), &dir.path().join("s"), compiler, 2);

    let report = orch.build_all(&BuildCancel::new()).await.unwrap();

    assert_eq!(report.total, 2);
    assert_eq!(report.failed, 2);
    assert_eq!(report.succeeded, 0);
}

#[tokio::test]
async fn enumeration_failure_aborts_batch() {
    let dir = tempfile::tempdir().unwrap();
    let compiler = Arc::new(FakeCompiler::new(dir.path()));
    let orch = orchestrator(Arc::new(DownRepository), &dir.path().join("s"), compiler, 2);

    let (tx, rx) = mpsc::channel(8);
    let result = orch.build_all_with_progress(&BuildCancel::new(), tx).await;

    assert!(matches!(result, Err(VaultError::Io(_))));
    assert!(drain(rx).await.is_empty());
}

#[tokio::test]
async fn pool_size_is_respected() {
    let dir = tempfile::tempdir().unwrap();
    let compiler = Arc::new(FakeCompiler::new(dir.path()).with_delay(Duration::from_millis(20)));
    let orch = orchestrator(Arc::new(corpus(12)), &dir.path().join("s"), compiler.clone(), 3);

    let report = orch.build_all(&BuildCancel::new()).await.unwrap();

    assert_eq!(report.succeeded, 12);
    assert!(compiler.max_in_flight.load(Ordering::SeqCst) <= 3);
    assert_eq!(compiler.calls.load(Ordering::SeqCst), 12);
}

// =============================================================================
// CANCELLATION
// =============================================================================

#[tokio::test]
async fn cancelled_before_start_skips_everything() {
    let dir = tempfile::tempdir().unwrap();
    let compiler = Arc::new(FakeCompiler::new(dir.path()));
    let orch = orchestrator(Arc::new(corpus(5)), &dir.path().join("s"), compiler.clone(), 2);

    let cancel = BuildCancel::new();
    cancel.cancel("maintenance");
    let report = orch.build_all(&cancel).await.unwrap();

    assert_eq!(report.total, 5);
    assert_eq!(report.cancelled(), 5);
    assert_eq!(report.failed, 5);
    assert_eq!(compiler.calls.load(Ordering::SeqCst), 0);
    assert!(
        report
            .results
            .iter()
            .all(|r| r.error.as_deref().is_some_and(|e| e.contains("maintenance")))
    );
}

#[tokio::test]
async fn cancellation_lets_running_job_finish() {
    let dir = tempfile::tempdir().unwrap();
    let cancel = BuildCancel::new();
    let compiler = Arc::new(FakeCompiler::new(dir.path()).cancelling(cancel.clone()));
    let orch = orchestrator(Arc::new(corpus(5)), &dir.path().join("s"), compiler.clone(), 1);

    let report = orch.build_all(&cancel).await.unwrap();

    assert_eq!(report.total, 5);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.cancelled(), 4);
    assert_eq!(compiler.calls.load(Ordering::SeqCst), 1);
}

// =============================================================================
// PROGRESS
// =============================================================================

#[tokio::test]
async fn progress_emits_one_event_per_job_then_closes() {
    let dir = tempfile::tempdir().unwrap();
    let compiler = Arc::new(FakeCompiler::new(dir.path()).failing("note03"));
    let orch = orchestrator(Arc::new(corpus(7)), &dir.path().join("s"), compiler, 3);

    let (tx, rx) = mpsc::channel(2);
    let collector = tokio::spawn(drain(rx));
    let report = orch
        .build_all_with_progress(&BuildCancel::new(), tx)
        .await
        .unwrap();
    let events = collector.await.unwrap();

    assert_eq!(report.total, 7);
    assert_eq!(events.len(), 7);
    let currents: Vec<_> = events.iter().map(|e| e.current).collect();
    assert_eq!(currents, (1..=7).collect::<Vec<_>>());
    assert!(events.iter().all(|e| e.total == 7));
    let failed: Vec<_> = events.iter().filter(|e| !e.success).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].slug, "note03");
    assert!(failed[0].error.is_some());
}

#[tokio::test]
async fn progress_closes_for_empty_vault() {
    let dir = tempfile::tempdir().unwrap();
    let compiler = Arc::new(FakeCompiler::new(dir.path()));
    let orch = orchestrator(Arc::new(corpus(0)), &dir.path().join("s"), compiler, 4);

    let (tx, rx) = mpsc::channel(1);
    let report = orch
        .build_all_with_progress(&BuildCancel::new(), tx)
        .await
        .unwrap();

    assert_eq!(report.total, 0);
    assert!(drain(rx).await.is_empty());
}

#[tokio::test]
async fn dropped_progress_receiver_does_not_stall_batch() {
    let dir = tempfile::tempdir().unwrap();
    let compiler = Arc::new(FakeCompiler::new(dir.path()));
    let orch = orchestrator(Arc::new(corpus(4)), &dir.path().join("s"), compiler, 2);

    let (tx, rx) = mpsc::channel(1);
    drop(rx);
    let report = orch
        .build_all_with_progress(&BuildCancel::new(), tx)
        .await
        .unwrap();

    assert_eq!(report.total, 4);
}
