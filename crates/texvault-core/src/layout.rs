//! # Vault Layout
//!
//! Where each piece of a vault lives on disk.

use crate::primitives::{
    ASSETS_DIR, CACHE_DIR, INDEX_FILE, MANIFEST_FILE, NOTES_DIR, OUTPUT_DIR, STAGING_DIR,
};
use std::path::{Path, PathBuf};

/// Resolved paths for one vault.
///
/// Every path is derived from `root` unless overridden; callers should pass
/// an absolute root so preprocessed artifacts embed absolute paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultLayout {
    pub root: PathBuf,
    pub notes_dir: PathBuf,
    pub assets_dir: PathBuf,
    pub output_dir: PathBuf,
    pub cache_dir: PathBuf,
}

impl VaultLayout {
    /// Default layout rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            notes_dir: root.join(NOTES_DIR),
            assets_dir: root.join(ASSETS_DIR),
            output_dir: root.join(OUTPUT_DIR),
            cache_dir: root.join(CACHE_DIR),
            root,
        }
    }

    /// Override the notes directory (relative paths are joined to the root).
    #[must_use]
    pub fn with_notes_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.notes_dir = self.root.join(dir);
        self
    }

    /// Override the assets directory (relative paths are joined to the root).
    #[must_use]
    pub fn with_assets_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.assets_dir = self.root.join(dir);
        self
    }

    /// Override the compiler output directory (relative paths are joined to
    /// the root).
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.output_dir = self.root.join(dir);
        self
    }

    /// Persisted link graph snapshot.
    #[must_use]
    pub fn index_path(&self) -> PathBuf {
        self.cache_dir.join(INDEX_FILE)
    }

    /// Directory receiving preprocessed artifacts.
    #[must_use]
    pub fn staging_dir(&self) -> PathBuf {
        self.cache_dir.join(STAGING_DIR)
    }

    /// Persisted asset manifest.
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.assets_dir.join(MANIFEST_FILE)
    }

    /// Create every directory of the layout.
    pub fn create_dirs(&self) -> std::io::Result<()> {
        for dir in [
            &self.notes_dir,
            &self.assets_dir,
            &self.output_dir,
            &self.staging_dir(),
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout() {
        let layout = VaultLayout::new("/vault");
        assert_eq!(layout.notes_dir, PathBuf::from("/vault/notes"));
        assert_eq!(layout.index_path(), PathBuf::from("/vault/.texvault/index.json"));
        assert_eq!(layout.staging_dir(), PathBuf::from("/vault/.texvault/staging"));
        assert_eq!(
            layout.manifest_path(),
            PathBuf::from("/vault/assets/manifest.json")
        );
    }

    #[test]
    fn overrides_are_rooted() {
        let layout = VaultLayout::new("/vault")
            .with_notes_dir("src")
            .with_output_dir("/tmp/out");
        assert_eq!(layout.notes_dir, PathBuf::from("/vault/src"));
        assert_eq!(layout.output_dir, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn create_dirs_builds_tree() {
        let dir = tempfile::tempdir().expect("tempdir");
        let layout = VaultLayout::new(dir.path());
        layout.create_dirs().expect("create");
        assert!(layout.notes_dir.is_dir());
        assert!(layout.staging_dir().is_dir());
    }
}
