//! # Note Repository
//!
//! The storage collaborator every core component reads notes through.
//!
//! The core never touches note files directly; it asks a `Repository`. Two
//! implementations ship with the crate:
//! - [`FsRepository`]: `.tex` files in a notes directory
//! - [`MemoryRepository`]: an in-process map, for tests and embedding
//!
//! All methods take `&self`; implementations handle their own interior
//! mutability so one repository can be shared behind an `Arc` by the
//! indexer, the preprocessor and a pool of build workers.

mod fs;
mod memory;

pub use fs::{FsRepository, HeaderComments, parse_header_comments};
pub use memory::MemoryRepository;

use crate::{Note, NoteHeader, VaultError};

/// Read/write access to the notes of one vault.
pub trait Repository: Send + Sync {
    /// Enumerate every note's header.
    ///
    /// A failure here is a corpus-level failure and aborts whatever
    /// operation asked for the listing.
    fn list_headers(&self) -> Result<Vec<NoteHeader>, VaultError>;

    /// Fetch one note with its source.
    ///
    /// Returns `VaultError::NotFound` if no note has this slug.
    fn get(&self, slug: &str) -> Result<Note, VaultError>;

    /// Whether a note with this slug exists.
    fn exists(&self, slug: &str) -> bool;

    /// Create or overwrite a note.
    fn save(&self, note: &Note) -> Result<(), VaultError>;

    /// Remove a note.
    ///
    /// Returns `VaultError::NotFound` if no note has this slug.
    fn delete(&self, slug: &str) -> Result<(), VaultError>;
}
