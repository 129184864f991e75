//! # Vault Handle
//!
//! One opened vault: its resolved layout, effective configuration and note
//! repository. Every component is built from here, so the CLI and the HTTP
//! server wire things the same way.

use crate::build::BuildOrchestrator;
use crate::compiler::{self, Compiler};
use crate::config::{CONFIG_FILE, DEFAULT_CONFIG_TOML, VaultConfig};
use std::path::Path;
use std::sync::Arc;
use texvault_core::{
    AssetStore, FsRepository, Indexer, Preprocessor, Repository, VaultError, VaultLayout,
};

/// An opened vault.
#[derive(Clone)]
pub struct Vault {
    layout: VaultLayout,
    config: VaultConfig,
    repo: Arc<dyn Repository>,
}

impl Vault {
    /// Open the vault at `root` with an already-resolved configuration.
    pub fn open(root: &Path, config: VaultConfig) -> Result<Self, VaultError> {
        let layout = config.layout(root)?;
        let repo: Arc<dyn Repository> = Arc::new(FsRepository::new(&layout.notes_dir));
        Ok(Self {
            layout,
            config,
            repo,
        })
    }

    /// Create the directory skeleton and a default `texvault.toml`.
    ///
    /// An existing config file is left alone unless `force` is set.
    pub fn init(root: &Path, force: bool) -> Result<Self, VaultError> {
        std::fs::create_dir_all(root)
            .map_err(|e| VaultError::io(format!("create {}", root.display()), e))?;

        let config_path = root.join(CONFIG_FILE);
        if force || !config_path.exists() {
            texvault_core::write_atomic(&config_path, DEFAULT_CONFIG_TOML.as_bytes())?;
        }

        let vault = Self::open(root, VaultConfig::load(root)?)?;
        vault
            .layout
            .create_dirs()
            .map_err(|e| VaultError::io(format!("create {}", vault.layout.root.display()), e))?;
        tracing::info!(root = %vault.layout.root.display(), "vault initialized");
        Ok(vault)
    }

    #[must_use]
    pub fn layout(&self) -> &VaultLayout {
        &self.layout
    }

    #[must_use]
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    #[must_use]
    pub fn repository(&self) -> Arc<dyn Repository> {
        Arc::clone(&self.repo)
    }

    pub fn indexer(&self) -> Indexer {
        Indexer::new(self.repository(), self.layout.index_path())
    }

    pub fn preprocessor(&self) -> Preprocessor {
        Preprocessor::new(
            self.repository(),
            &self.layout.notes_dir,
            self.layout.staging_dir(),
        )
    }

    pub fn asset_store(&self) -> AssetStore {
        AssetStore::new(&self.layout.assets_dir, self.layout.manifest_path())
    }

    /// The configured compiler backend.
    pub fn compiler(&self) -> Arc<dyn Compiler> {
        compiler::from_kind(self.config.compiler, &self.layout.output_dir)
    }

    /// Orchestrator using the configured backend and pool size.
    pub fn orchestrator(&self) -> BuildOrchestrator {
        self.orchestrator_with(self.compiler())
    }

    /// Orchestrator using a specific backend.
    pub fn orchestrator_with(&self, compiler: Arc<dyn Compiler>) -> BuildOrchestrator {
        BuildOrchestrator::for_layout(&self.layout, self.repository(), compiler)
            .with_workers(self.config.workers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_creates_skeleton_and_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let vault = Vault::init(dir.path(), false).expect("init");

        assert!(vault.layout().notes_dir.is_dir());
        assert!(vault.layout().assets_dir.is_dir());
        assert!(vault.layout().output_dir.is_dir());
        assert!(dir.path().join(CONFIG_FILE).is_file());
    }

    #[test]
    fn init_keeps_existing_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(CONFIG_FILE), "workers = 7\n").expect("write");

        let vault = Vault::init(dir.path(), false).expect("init");
        let text = std::fs::read_to_string(dir.path().join(CONFIG_FILE)).expect("read");
        assert_eq!(text, "workers = 7\n");
        assert!(vault.layout().root.is_absolute());
    }

    #[test]
    fn empty_vault_indexes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let vault = Vault::open(dir.path(), VaultConfig::default()).expect("open");
        let stats = vault.indexer().reindex().expect("reindex");
        assert_eq!(stats.total_notes, 0);
    }
}
