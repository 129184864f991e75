//! # Compiler Backends
//!
//! The external typesetting engine behind one trait.
//!
//! A backend turns a staged `.tex` file into `<output_dir>/<slug>.pdf`. It is
//! chosen once at startup from configuration ([`from_kind`]) and used through
//! `Arc<dyn Compiler>` from then on.
//!
//! The engine is always spawned as a child process and never linked. A
//! missing binary is an `Io` error; a nonzero exit is a `CompileFailure`
//! carrying the combined stdout/stderr.

mod latexmk;
mod tectonic;

pub use latexmk::LatexmkCompiler;
pub use tectonic::TectonicCompiler;

use crate::config::CompilerKind;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use texvault_core::{VaultError, normalize};

// =============================================================================
// TRAIT
// =============================================================================

/// A PDF compiler for staged notes.
#[async_trait]
pub trait Compiler: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Compile `staged` into the output directory.
    ///
    /// `extra_env` is added to the child's environment.
    async fn compile(&self, staged: &Path, extra_env: &[(String, String)])
    -> Result<(), VaultError>;

    /// Where the PDF for `slug` ends up after a successful compile.
    fn output_path(&self, slug: &str) -> PathBuf;
}

/// Build the configured backend writing into `output_dir`.
pub fn from_kind(kind: CompilerKind, output_dir: impl Into<PathBuf>) -> Arc<dyn Compiler> {
    match kind {
        CompilerKind::Latexmk => Arc::new(LatexmkCompiler::new(output_dir)),
        CompilerKind::Tectonic => Arc::new(TectonicCompiler::new(output_dir)),
    }
}

// =============================================================================
// PROCESS PLUMBING
// =============================================================================

/// Run `program args..` in the staged file's directory and map the outcome.
pub(crate) async fn run_engine(
    program: &OsString,
    args: Vec<OsString>,
    staged: &Path,
    extra_env: &[(String, String)],
) -> Result<(), VaultError> {
    let mut command = tokio::process::Command::new(program);
    command
        .args(&args)
        .envs(extra_env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(std::process::Stdio::null())
        .kill_on_drop(true);
    if let Some(dir) = staged.parent() {
        command.current_dir(dir);
    }

    tracing::debug!(program = ?program, args = ?args, "spawning compiler");
    let output = command.output().await.map_err(|e| {
        VaultError::io(format!("failed to run `{}`", program.to_string_lossy()), e)
    })?;

    if output.status.success() {
        return Ok(());
    }

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    Err(VaultError::CompileFailure {
        code: output.status.code(),
        output: combined,
    })
}

/// Slug the staged file belongs to.
pub(crate) fn staged_slug(staged: &Path) -> Result<String, VaultError> {
    staged
        .file_stem()
        .and_then(|s| s.to_str())
        .map(normalize)
        .filter(|slug| !slug.is_empty())
        .ok_or_else(|| {
            VaultError::InvalidInput(format!("not a note file: {}", staged.display()))
        })
}

/// Rename `<stem>.pdf` to `<slug>.pdf` when a dated filename made them differ.
pub(crate) async fn publish_pdf(output_dir: &Path, staged: &Path) -> Result<PathBuf, VaultError> {
    let slug = staged_slug(staged)?;
    let target = output_dir.join(format!("{}.pdf", slug));

    let Some(stem) = staged.file_stem() else {
        return Ok(target);
    };
    let mut produced_name = stem.to_os_string();
    produced_name.push(".pdf");
    let produced = output_dir.join(produced_name);

    if produced != target {
        tokio::fs::rename(&produced, &target).await.map_err(|e| {
            VaultError::io(
                format!("rename {} to {}", produced.display(), target.display()),
                e,
            )
        })?;
    }
    Ok(target)
}

// =============================================================================
// TESTS
// =============================================================================
