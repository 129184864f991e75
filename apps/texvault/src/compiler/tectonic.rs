//! Self-contained `tectonic` engine.

use super::{Compiler, publish_pdf, run_engine};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use texvault_core::VaultError;

/// Runs `tectonic --outdir <dir> <staged>`.
#[derive(Debug, Clone)]
pub struct TectonicCompiler {
    program: OsString,
    output_dir: PathBuf,
}

impl TectonicCompiler {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: OsString::from("tectonic"),
            output_dir: output_dir.into(),
        }
    }

    /// Use a specific `tectonic` executable instead of the one on `PATH`.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }

    fn args(&self, staged: &Path) -> Vec<OsString> {
        vec![
            "--outdir".into(),
            self.output_dir.as_os_str().to_os_string(),
            staged.as_os_str().to_os_string(),
        ]
    }
}

#[async_trait]
impl Compiler for TectonicCompiler {
    fn name(&self) -> &'static str {
        "tectonic"
    }

    async fn compile(
        &self,
        staged: &Path,
        extra_env: &[(String, String)],
    ) -> Result<(), VaultError> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| VaultError::io(format!("create {}", self.output_dir.display()), e))?;
        run_engine(&self.program, self.args(staged), staged, extra_env).await?;
        publish_pdf(&self.output_dir, staged).await?;
        Ok(())
    }

    fn output_path(&self, slug: &str) -> PathBuf {
        self.output_dir.join(format!("{}.pdf", slug))
    }
}
