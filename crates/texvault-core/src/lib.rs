//! # texvault-core
//!
//! The synchronous engine of texvault - THE LOGIC.
//!
//! A vault is a flat directory of LaTeX notes that reference each other by
//! slug. This crate knows how to:
//! - turn any reference string into a canonical slug (`normalize`)
//! - scan the corpus and persist the link graph with backlinks (`index`)
//! - rewrite one note into a self-contained, hyperlinked artifact ready for
//!   an external compiler (`preprocess`)
//! - store attachments by content digest (`assets`)
//!
//! ## Architectural Constraints
//!
//! - No async, no network dependencies (pure Rust)
//! - Note storage is reached only through the [`Repository`] trait
//! - Every persisted collection is a `BTreeMap`/`BTreeSet`, so snapshots of
//!   the same corpus are identical
//! - Index and manifest state live in owned values, never in globals
//!
//! Compilation, worker pools and every outer surface live in the `texvault`
//! app crate.

// =============================================================================
// MODULES
// =============================================================================

pub mod assets;
pub mod formats;
pub mod index;
pub mod layout;
pub mod normalize;
pub mod preprocess;
pub mod primitives;
pub mod repository;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{Note, NoteHeader, VaultError};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use assets::{Asset, AssetStore, Manifest, StoredAsset, VerifyReport, content_hash};
pub use index::{
    GraphEdge, GraphNode, GraphView, Index, IndexEntry, IndexStats, Indexer, ScanResult,
    scan_references,
};
pub use layout::VaultLayout;
pub use normalize::{date_prefix, normalize, slugify};
pub use preprocess::Preprocessor;
pub use repository::{FsRepository, MemoryRepository, Repository};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{load_snapshot, save_snapshot, write_atomic};
