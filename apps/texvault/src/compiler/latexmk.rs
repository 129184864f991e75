//! `latexmk` over a full TeX distribution.

use super::{Compiler, publish_pdf, run_engine};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use texvault_core::VaultError;

/// Runs `latexmk -pdf -interaction=nonstopmode -halt-on-error -outdir=<dir>`.
#[derive(Debug, Clone)]
pub struct LatexmkCompiler {
    program: OsString,
    output_dir: PathBuf,
}

impl LatexmkCompiler {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: OsString::from("latexmk"),
            output_dir: output_dir.into(),
        }
    }

    /// Use a specific `latexmk` executable instead of the one on `PATH`.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }

    fn args(&self, staged: &Path) -> Vec<OsString> {
        let mut outdir = OsString::from("-outdir=");
        outdir.push(&self.output_dir);
        vec![
            "-pdf".into(),
            "-interaction=nonstopmode".into(),
            "-halt-on-error".into(),
            outdir,
            staged.as_os_str().to_os_string(),
        ]
    }
}

#[async_trait]
impl Compiler for LatexmkCompiler {
    fn name(&self) -> &'static str {
        "latexmk"
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
