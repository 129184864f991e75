//! # Vault Configuration
//!
//! `texvault.toml` at the vault root, then environment, then CLI flags.
//!
//! ```toml
//! workers = 4
//! compiler = "latexmk"   # or "tectonic"
//!
//! [paths]               # relative to the vault root
//! notes = "notes"
//! assets = "assets"
//! output = "pdf"
//! ```
//!
//! ## Environment Variables
//!
//! - `TEXVAULT_WORKERS`: build pool size
//! - `TEXVAULT_COMPILER`: `latexmk` or `tectonic`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use texvault_core::{VaultError, VaultLayout};

/// Config file name at the vault root.
pub const CONFIG_FILE: &str = "texvault.toml";

/// Default build pool size.
pub const DEFAULT_WORKERS: usize = 4;

/// Written by `texvault init`.
pub const DEFAULT_CONFIG_TOML: &str = r#"# texvault configuration
workers = 4
compiler = "latexmk"

[paths]
notes = "notes"
assets = "assets"
output = "pdf"
"#;

// =============================================================================
// COMPILER KIND
// =============================================================================

/// Which external typesetting backend to spawn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompilerKind {
    /// `latexmk -pdf` over a full TeX distribution.
    #[default]
    Latexmk,
    /// Self-contained `tectonic` engine.
    Tectonic,
}

impl FromStr for CompilerKind {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "latexmk" => Ok(Self::Latexmk),
            "tectonic" => Ok(Self::Tectonic),
            other => Err(VaultError::InvalidInput(format!(
                "unknown compiler '{}' (expected latexmk or tectonic)",
                other
            ))),
        }
    }
}

impl fmt::Display for CompilerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latexmk => f.write_str("latexmk"),
            Self::Tectonic => f.write_str("tectonic"),
        }
    }
}

// =============================================================================
// CONFIG
// =============================================================================

/// Optional directory overrides, relative to the vault root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub notes: Option<PathBuf>,
    pub assets: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

/// Effective configuration for one vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    pub workers: usize,
    pub compiler: CompilerKind,
    pub paths: PathsConfig,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            compiler: CompilerKind::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl VaultConfig {
    /// Load `texvault.toml` from `root` (defaults if absent), then apply
    /// environment overrides.
    pub fn load(root: &Path) -> Result<Self, VaultError> {
        let path = root.join(CONFIG_FILE);
        let config = match std::fs::read_to_string(&path) {
            Ok(text) => Self::from_toml_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Self::default()
            }
            Err(e) => return Err(VaultError::io(format!("read {}", path.display()), e)),
        };

        config.with_overrides(
            std::env::var("TEXVAULT_WORKERS").ok().as_deref(),
            std::env::var("TEXVAULT_COMPILER").ok().as_deref(),
        )
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, VaultError> {
        let config: Self = toml::from_str(text)
            .map_err(|e| VaultError::Serialization(format!("{}: {}", CONFIG_FILE, e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply string overrides (environment variables or CLI flags).
    ///
    /// `None` leaves the current value in place.
    pub fn with_overrides(
        mut self,
        workers: Option<&str>,
        compiler: Option<&str>,
    ) -> Result<Self, VaultError> {
        if let Some(raw) = workers {
            self.workers = raw.trim().parse().map_err(|_| {
                VaultError::InvalidInput(format!("workers must be a positive integer, got '{}'", raw))
            })?;
        }
        if let Some(raw) = compiler {
            self.compiler = raw.parse()?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Reject values the build pool cannot run with.
    pub fn validate(&self) -> Result<(), VaultError> {
        if self.workers == 0 {
            return Err(VaultError::InvalidInput(
                "workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the vault layout with an absolute root.
    pub fn layout(&self, root: &Path) -> Result<VaultLayout, VaultError> {
        let root = std::path::absolute(root)
            .map_err(|e| VaultError::io(format!("resolve {}", root.display()), e))?;

        let mut layout = VaultLayout::new(root);
        if let Some(notes) = &self.paths.notes {
            layout = layout.with_notes_dir(notes);
        }
        if let Some(assets) = &self.paths.assets {
            layout = layout.with_assets_dir(assets);
        }
        if let Some(output) = &self.paths.output {
            layout = layout.with_output_dir(output);
        }
        Ok(layout)
    }
}

// =============================================================================
// TESTS
// =============================================================================
