//! # Asset Store
//!
//! Content-addressed ingestion of binary attachments (figures, PDFs, data).
//!
//! Identity is the BLAKE3 digest of the bytes, not the file name:
//! - identical bytes under any display name collapse to one stored file
//! - different bytes wanting the same name get a numeric suffix
//!   (`diagram.png`, `diagram-1.png`, ...)
//!
//! The manifest (stored filename → [`Asset`]) is loaded lazily on first use,
//! kept in memory, and rewritten in full after every mutation.
//!
//! A manifest entry whose file was deleted behind our back is stale. Stale
//! entries are never trusted as duplicates; they are dropped when found.

use crate::formats::{load_snapshot, save_snapshot};
use crate::normalize::slugify;
use crate::primitives::{FALLBACK_ASSET_NAME, MAX_COLLISION_SUFFIX};
use crate::VaultError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// =============================================================================
// TYPES
// =============================================================================

/// One stored attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Name inside the assets directory.
    pub filename: String,
    /// Display name supplied at upload.
    pub original_name: String,
    pub description: String,
    /// BLAKE3 digest of the content, lower-case hex.
    pub hash: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Stored filename → asset.
pub type Manifest = BTreeMap<String, Asset>;

/// Result of [`AssetStore::store`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAsset {
    pub filename: String,
    /// The bytes were already stored; nothing was copied.
    pub is_duplicate: bool,
}

/// Result of [`AssetStore::verify`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReport {
    /// Entries whose digest matches the file on disk.
    pub ok: usize,
    /// Entries whose file no longer exists.
    pub missing: Vec<String>,
    /// Entries whose file content no longer matches the recorded digest.
    pub mismatched: Vec<String>,
}

impl VerifyReport {
    /// Whether every entry checked out.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.mismatched.is_empty()
    }
}

/// Digest bytes as lower-case hex BLAKE3.
#[must_use]
pub fn content_hash(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

// =============================================================================
// ASSET STORE
// =============================================================================

/// Stores attachments in one directory, deduplicated by content.
#[derive(Debug)]
pub struct AssetStore {
    dir: PathBuf,
    manifest_path: PathBuf,
    manifest: Option<Manifest>,
}

impl AssetStore {
    /// Create a store over `dir` with its manifest at `manifest_path`.
    ///
    /// Nothing is read until the first operation.
    pub fn new(dir: impl Into<PathBuf>, manifest_path: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            manifest_path: manifest_path.into(),
            manifest: None,
        }
    }

    /// The assets directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Ingest `source` under `display_name`.
    ///
    /// # Errors
    /// - `VaultError::NotFound` if `source` cannot be opened
    /// - `VaultError::Io` if copying or persisting the manifest fails
    pub fn store(
        &mut self,
        source: &Path,
        display_name: &str,
        description: &str,
    ) -> Result<StoredAsset, VaultError> {
        let bytes = std::fs::read(source).map_err(|e| {
            VaultError::NotFound(format!("asset source {}: {}", source.display(), e))
        })?;
        let hash = content_hash(&bytes);

        let manifest = load_manifest(&mut self.manifest, &self.manifest_path)?;

        if let Some(existing) = take_live_duplicate(manifest, &self.dir, &hash) {
            if let Some(asset) = manifest.get_mut(&existing) {
                if !description.is_empty() {
                    asset.description = description.to_string();
                }
            }
            save_snapshot(&self.manifest_path, manifest)?;
            tracing::info!(filename = %existing, hash = %hash, "asset already stored");
            return Ok(StoredAsset {
                filename: existing,
                is_duplicate: true,
            });
        }

        let desired = desired_name(source, display_name);
        let filename = self.free_name(&desired)?;
        let destination = self.dir.join(&filename);

        std::fs::create_dir_all(&self.dir)
            .map_err(|e| VaultError::io(format!("create {}", self.dir.display()), e))?;
        std::fs::write(&destination, &bytes)
            .map_err(|e| VaultError::io(format!("copy to {}", destination.display()), e))?;

        let manifest = load_manifest(&mut self.manifest, &self.manifest_path)?;
        manifest.insert(
            filename.clone(),
            Asset {
                filename: filename.clone(),
                original_name: display_name.to_string(),
                description: description.to_string(),
                hash: hash.clone(),
                uploaded_at: Utc::now(),
            },
        );
        save_snapshot(&self.manifest_path, manifest)?;

        tracing::info!(
            filename = %filename,
            hash = %hash,
            bytes = bytes.len(),
            "asset stored"
        );
        Ok(StoredAsset {
            filename,
            is_duplicate: false,
        })
    }

    /// Every manifest entry, ordered by filename.
    pub fn list(&mut self) -> Result<Vec<Asset>, VaultError> {
        let manifest = load_manifest(&mut self.manifest, &self.manifest_path)?;
        Ok(manifest.values().cloned().collect())
    }

    /// Look up one entry.
    pub fn get(&mut self, filename: &str) -> Result<Option<Asset>, VaultError> {
        let manifest = load_manifest(&mut self.manifest, &self.manifest_path)?;
        Ok(manifest.get(filename).cloned())
    }

    /// Delete an asset's file and manifest entry.
    ///
    /// An already-missing file is not an error; a missing entry is.
    pub fn remove(&mut self, filename: &str) -> Result<Asset, VaultError> {
        let manifest = load_manifest(&mut self.manifest, &self.manifest_path)?;
        let asset = manifest
            .remove(filename)
            .ok_or_else(|| VaultError::NotFound(format!("asset '{}'", filename)))?;

        let path = self.dir.join(filename);
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(VaultError::io(format!("remove {}", path.display()), e)),
        }
        save_snapshot(&self.manifest_path, manifest)?;
        Ok(asset)
    }

    /// Re-hash every stored file against the manifest.
    pub fn verify(&mut self) -> Result<VerifyReport, VaultError> {
        let manifest = load_manifest(&mut self.manifest, &self.manifest_path)?;
        let mut report = VerifyReport::default();

        for (name, asset) in manifest.iter() {
            let path = self.dir.join(name);
            match std::fs::read(&path) {
                Ok(bytes) if content_hash(&bytes) == asset.hash => report.ok += 1,
                Ok(_) => report.mismatched.push(name.clone()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    report.missing.push(name.clone());
                }
                Err(e) => return Err(VaultError::io(format!("read {}", path.display()), e)),
            }
        }
        Ok(report)
    }

    /// First unused name: `desired`, then `stem-1.ext`, `stem-2.ext`, ...
    fn free_name(&self, desired: &str) -> Result<String, VaultError> {
        if !self.is_occupied(desired) {
            return Ok(desired.to_string());
        }
        let (stem, ext) = match desired.rsplit_once('.') {
            Some((stem, ext)) => (stem, Some(ext)),
            None => (desired, None),
        };
        for n in 1..=MAX_COLLISION_SUFFIX {
            let candidate = match ext {
                Some(ext) => format!("{stem}-{n}.{ext}"),
                None => format!("{stem}-{n}"),
            };
            if !self.is_occupied(&candidate) {
                return Ok(candidate);
            }
        }
        Err(VaultError::InvalidInput(format!(
            "no free name for '{}' after {} attempts",
            desired, MAX_COLLISION_SUFFIX
        )))
    }

    fn is_occupied(&self, name: &str) -> bool {
        let path = self.dir.join(name);
        path.exists() || path == self.manifest_path
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Load the manifest into `slot` on first use.
fn load_manifest<'a>(
    slot: &'a mut Option<Manifest>,
    path: &Path,
) -> Result<&'a mut Manifest, VaultError> {
    if slot.is_none() {
        let loaded: Manifest = load_snapshot(path)?.unwrap_or_default();
        tracing::debug!(entries = loaded.len(), path = %path.display(), "manifest loaded");
        *slot = Some(loaded);
    }
    Ok(slot.get_or_insert_with(Manifest::new))
}

/// Find a stored file with this digest that still exists on disk.
///
/// Entries carrying the digest whose file is gone are removed from the
/// manifest as stale.
fn take_live_duplicate(manifest: &mut Manifest, dir: &Path, hash: &str) -> Option<String> {
    let candidates: Vec<String> = manifest
        .values()
        .filter(|a| a.hash == hash)
        .map(|a| a.filename.clone())
        .collect();

    let mut live = None;
    for name in candidates {
        if dir.join(&name).is_file() {
            live.get_or_insert(name);
        } else {
            tracing::warn!(filename = %name, "dropping stale manifest entry");
            manifest.remove(&name);
        }
    }
    live
}

/// `slugify(stem(display_name))` plus the source's lower-cased extension.
fn desired_name(source: &Path, display_name: &str) -> String {
    let stem = Path::new(display_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(display_name);
    let mut base = slugify(stem);
    if base.is_empty() {
        base = FALLBACK_ASSET_NAME.to_string();
    }

    match source.extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.is_empty() => format!("{}.{}", base, ext.to_lowercase()),
        _ => base,
    }
}

// =============================================================================
// TESTS
// =============================================================================
