//! # Persistence Format
//!
//! JSON snapshots for the index and the asset manifest.
//!
//! Both files are written wholesale: a snapshot is serialized in full,
//! written to a temporary file in the destination directory, then renamed
//! over the previous file. A crash mid-write leaves either the old or the
//! new snapshot, never a truncated one.
//!
//! ## Size validation
//!
//! Loading checks the file size against `MAX_SNAPSHOT_SIZE` before reading,
//! so a corrupted or hostile file cannot force an unbounded allocation.

use crate::VaultError;
use crate::primitives::MAX_SNAPSHOT_SIZE;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::Write;
use std::path::Path;

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize a snapshot to pretty JSON bytes.
///
/// This is a pure transformation - no file I/O.
pub fn snapshot_to_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, VaultError> {
    let mut bytes =
        serde_json::to_vec_pretty(value).map_err(|e| VaultError::Serialization(e.to_string()))?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Deserialize a snapshot from JSON bytes.
///
/// This is a pure transformation - no file I/O.
pub fn snapshot_from_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, VaultError> {
    serde_json::from_slice(bytes)
        .map_err(|e| VaultError::Serialization(format!("Failed to parse snapshot: {}", e)))
}

// =============================================================================
// FILE I/O
// =============================================================================

/// Load a snapshot, returning `Ok(None)` when the file does not exist.
pub fn load_snapshot<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, VaultError> {
    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(VaultError::io(format!("stat {}", path.display()), e)),
    };

    if metadata.len() > MAX_SNAPSHOT_SIZE {
        return Err(VaultError::Serialization(format!(
            "Snapshot {} is {} bytes, exceeds maximum allowed {} bytes",
            path.display(),
            metadata.len(),
            MAX_SNAPSHOT_SIZE
        )));
    }

    let bytes =
        std::fs::read(path).map_err(|e| VaultError::io(format!("read {}", path.display()), e))?;
    snapshot_from_bytes(&bytes).map(Some)
}

/// Persist a snapshot by writing a temp file next to `path` and renaming it
/// into place.
pub fn save_snapshot<T: Serialize>(path: &Path, value: &T) -> Result<(), VaultError> {
    let bytes = snapshot_to_bytes(value)?;
    write_atomic(path, &bytes)
}

/// Write bytes to `path` through a same-directory temp file and rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), VaultError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir)
        .map_err(|e| VaultError::io(format!("create {}", dir.display()), e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| VaultError::io(format!("temp file in {}", dir.display()), e))?;
    tmp.write_all(bytes)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| VaultError::io(format!("write temp for {}", path.display()), e))?;
    tmp.persist(path)
        .map_err(|e| VaultError::io(format!("rename into {}", path.display()), e.error))?;
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
