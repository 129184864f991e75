//! # Build Types
//!
//! Results and progress events produced by the orchestrator. All of them
//! serialize to JSON for the CLI `--json-mode` and the HTTP API.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use texvault_core::VaultError;

// =============================================================================
// JOB STATE
// =============================================================================

/// Lifecycle of one build job.
///
/// `Queued -> Preprocessing -> Compiling -> {Succeeded | Failed | Cancelled}`.
/// A job never moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Preprocessing,
    Compiling,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobState {
    /// Whether the job has finished.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Queued => "queued",
            Self::Preprocessing => "preprocessing",
            Self::Compiling => "compiling",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

// =============================================================================
// BUILD RESULT
// =============================================================================

/// Outcome of building one note. Always produced, even on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildResult {
    pub slug: String,
    /// Terminal state.
    pub state: JobState,
    pub success: bool,
    /// PDF location reported by the compiler on success.
    pub output_path: Option<PathBuf>,
    pub error: Option<String>,
    /// Stage that was running when the job failed.
    pub failed_stage: Option<JobState>,
    /// Captured compiler output for `CompileFailure`.
    pub compiler_output: Option<String>,
    pub elapsed_ms: u64,
}

impl BuildResult {
    pub fn succeeded(slug: impl Into<String>, output_path: PathBuf, elapsed_ms: u64) -> Self {
        Self {
            slug: slug.into(),
            state: JobState::Succeeded,
            success: true,
            output_path: Some(output_path),
            error: None,
            failed_stage: None,
            compiler_output: None,
            elapsed_ms,
        }
    }

    /// A failure during `stage`, keeping the compiler log if there is one.
    pub fn failed(
        slug: impl Into<String>,
        stage: JobState,
        error: &VaultError,
        elapsed_ms: u64,
    ) -> Self {
        let compiler_output = match error {
            VaultError::CompileFailure { output, .. } => Some(output.clone()),
            _ => None,
        };
        Self {
            slug: slug.into(),
            state: JobState::Failed,
            success: false,
            output_path: None,
            error: Some(error.to_string()),
            failed_stage: Some(stage),
            compiler_output,
            elapsed_ms,
        }
    }

    /// Skipped because cancellation was requested before the job started.
    pub fn cancelled(slug: impl Into<String>, reason: &str) -> Self {
        Self {
            slug: slug.into(),
            state: JobState::Cancelled,
            success: false,
            output_path: None,
            error: Some(VaultError::Cancelled(reason.to_string()).to_string()),
            failed_stage: Some(JobState::Queued),
            compiler_output: None,
            elapsed_ms: 0,
        }
    }
}

// =============================================================================
// BATCH REPORT
// =============================================================================

/// Aggregate over a batch build.
///
/// `results` is in arrival order, not input order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    /// Failed and cancelled jobs.
    pub failed: usize,
    pub results: Vec<BuildResult>,
}

impl BatchReport {
    pub fn from_results(results: Vec<BuildResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }

    /// Number of jobs that were skipped by cancellation.
    #[must_use]
    pub fn cancelled(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.state == JobState::Cancelled)
            .count()
    }
}

// =============================================================================
// PROGRESS
// =============================================================================

/// One event per completed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildProgress {
    /// 1-based count of completed jobs.
    pub current: usize,
    pub total: usize,
    pub slug: String,
    pub success: bool,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_counts() {
        let report = BatchReport::from_results(vec![
            BuildResult::succeeded("a", PathBuf::from("/pdf/a.pdf"), 5),
            BuildResult::failed("b", JobState::Compiling, &VaultError::Io("x".into()), 3),
            BuildResult::cancelled("c", "user interrupt"),
        ]);
        assert_eq!(report.total, 3);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 2);
        assert_eq!(report.cancelled(), 1);
    }

    #[test]
    fn compile_failure_output_is_kept() {
        let err = VaultError::CompileFailure {
            code: Some(12),
            output: "! LaTeX Error: File `missing.sty' not found.".to_string(),
        };
        let result = BuildResult::failed("a", JobState::Compiling, &err, 1);
        assert_eq!(result.failed_stage, Some(JobState::Compiling));
        assert!(
            result
                .compiler_output
                .as_deref()
                .is_some_and(|o| o.contains("missing.sty"))
        );
    }

    #[test]
    fn cancelled_result_carries_reason() {
        let result = BuildResult::cancelled("a", "shutdown");
        assert_eq!(result.state, JobState::Cancelled);
        assert!(result.error.as_deref().is_some_and(|e| e.contains("shutdown")));
        assert!(result.state.is_terminal());
        assert!(!JobState::Compiling.is_terminal());
    }

    #[test]
    fn states_serialize_snake_case() {
        let json = serde_json::to_string(&JobState::Succeeded).expect("json");
        assert_eq!(json, "\"succeeded\"");
    }
}
