//! # Core Type Definitions
//!
//! This module contains the types shared by every texvault component:
//! - Note identity and metadata (`NoteHeader`, `Note`)
//! - Error types (`VaultError`)
//!
//! ## Determinism Guarantees
//!
//! Tags are held in a `BTreeSet`, so two headers with the same tags compare
//! and serialize identically regardless of the order they were declared in.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

// =============================================================================
// NOTE HEADER
// =============================================================================

/// Metadata describing one note in the vault.
///
/// The `slug` is the canonical identifier other notes use to reference this
/// one; it is derived from `filename` by the normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteHeader {
    /// Canonical identifier (filename without extension or date prefix).
    pub slug: String,
    /// File name inside the notes directory, e.g. `20240312-intro.tex`.
    pub filename: String,
    /// Human readable title used as hyperlink text.
    pub title: String,
    /// `YYYY-MM-DD`, or empty when unknown.
    pub date: String,
    /// Tags, never null.
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl NoteHeader {
    /// Create a header with no date and no tags.
    #[must_use]
    pub fn new(
        slug: impl Into<String>,
        filename: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            slug: slug.into(),
            filename: filename.into(),
            title: title.into(),
            date: String::new(),
            tags: BTreeSet::new(),
        }
    }

    /// Set the date.
    #[must_use]
    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = date.into();
        self
    }

    /// Add tags.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }
}

// =============================================================================
// NOTE
// =============================================================================

/// A note header together with its raw LaTeX source.
///
/// Owned transiently while indexing or preprocessing; the repository file
/// remains the source of truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub header: NoteHeader,
    pub content: String,
}

impl Note {
    /// Create a new note.
    #[must_use]
    pub fn new(header: NoteHeader, content: impl Into<String>) -> Self {
        Self {
            header,
            content: content.into(),
        }
    }

    /// The note's slug.
    #[must_use]
    pub fn slug(&self) -> &str {
        &self.header.slug
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in texvault.
///
/// - No silent failures at the corpus level
/// - Per-item failures are recorded by the caller, not swallowed here
/// - The core should never panic; all errors must be recoverable
#[derive(Debug, Error)]
pub enum VaultError {
    /// A note, source file, template or manifest reference does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Reading or writing a file failed.
    #[error("I/O error: {0}")]
    Io(String),

    /// The external compiler exited unsuccessfully.
    ///
    /// `output` carries the combined stdout/stderr for diagnostics.
    #[error("Compilation failed (exit code {code:?})")]
    CompileFailure { code: Option<i32>, output: String },

    /// Cooperative cancellation was observed before the job started.
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// A persisted snapshot or config file could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A caller supplied a value that cannot be used.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl VaultError {
    /// Build an `Io` error with context about what was being done.
    pub fn io(context: impl std::fmt::Display, err: impl std::fmt::Display) -> Self {
        Self::Io(format!("{}: {}", context, err))
    }

    /// Whether this error means "the thing does not exist".
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_tags_are_ordered_and_deduplicated() {
        let header = NoteHeader::new("intro", "intro.tex", "Intro").with_tags(["b", "a", "b"]);

        let tags: Vec<_> = header.tags.iter().map(String::as_str).collect();
        assert_eq!(tags, vec!["a", "b"]);
    }

    #[test]
    fn header_tags_default_to_empty_when_missing_from_json() {
        let json = r#"{"slug":"a","filename":"a.tex","title":"A","date":""}"#;
        let header: NoteHeader = serde_json::from_str(json).expect("parse");
        assert!(header.tags.is_empty());
    }

    #[test]
    fn compile_failure_keeps_output() {
        let err = VaultError::CompileFailure {
            code: Some(1),
            output: "! Undefined control sequence.".to_string(),
        };
        assert_eq!(err.to_string(), "Compilation failed (exit code Some(1))");
        match err {
            VaultError::CompileFailure { output, .. } => {
                assert!(output.contains("Undefined control sequence"));
            }
            other => unreachable!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn not_found_predicate() {
        assert!(VaultError::NotFound("x".into()).is_not_found());
        assert!(!VaultError::Io("x".into()).is_not_found());
    }
}
