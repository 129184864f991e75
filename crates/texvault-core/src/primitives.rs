//! # Vault Primitives
//!
//! Fixed constants shared by the core components.
//!
//! These are compiled into the binary and are immutable at runtime. Anything
//! a user may reasonably want to change lives in the app's configuration
//! instead.

/// Version string written into every index snapshot.
///
/// Increment this when making breaking changes to the index file layout.
pub const INDEX_VERSION: &str = "1.0";

/// The hyperlink-styling import the preprocessor guarantees is present.
pub const HYPERREF_IMPORT: &str = r"\usepackage{hyperref}";

/// Extension of note source files.
pub const NOTE_EXTENSION: &str = "tex";

/// Length of a `YYYYMMDD` filename date prefix (without the hyphen).
pub const DATE_PREFIX_DIGITS: usize = 8;

/// Stored name used when a display name slugifies to nothing.
pub const FALLBACK_ASSET_NAME: &str = "asset";

// =============================================================================
// VAULT LAYOUT NAMES
// =============================================================================

/// Directory holding note sources, relative to the vault root.
pub const NOTES_DIR: &str = "notes";

/// Directory holding stored attachments, relative to the vault root.
pub const ASSETS_DIR: &str = "assets";

/// Directory holding compiler output, relative to the vault root.
pub const OUTPUT_DIR: &str = "pdf";

/// Hidden directory for caches (index, staging), relative to the vault root.
pub const CACHE_DIR: &str = ".texvault";

/// Index snapshot file name inside the cache directory.
pub const INDEX_FILE: &str = "index.json";

/// Staging directory name inside the cache directory.
pub const STAGING_DIR: &str = "staging";

/// Asset manifest file name inside the assets directory.
pub const MANIFEST_FILE: &str = "manifest.json";

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum size of a persisted snapshot (index or manifest) accepted on load.
///
/// Validated before deserialization so a corrupted or hostile file cannot
/// force an unbounded allocation.
pub const MAX_SNAPSHOT_SIZE: u64 = 256 * 1024 * 1024; // 256 MB

/// Upper bound for the numeric suffix search during asset collision
/// resolution.
pub const MAX_COLLISION_SUFFIX: u32 = 100_000;
