//! # Link Graph Indexer
//!
//! Full-corpus scan that rebuilds and persists the [`Index`].
//!
//! Two passes:
//! 1. Scan every note for `\input`, `\include`, `\ref`, `\cref`, `\cite`
//!    (normalized into slugs) and `\includegraphics` (kept raw).
//! 2. Invert the graph into backlinks.
//!
//! Robustness policy: a note that cannot be read is skipped and logged; only
//! a failure to enumerate the corpus aborts the reindex.

use super::{Index, IndexEntry};
use crate::formats::{load_snapshot, save_snapshot};
use crate::normalize::normalize;
use crate::repository::Repository;
use crate::VaultError;
use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

// =============================================================================
// PATTERNS
// =============================================================================

/// `\input{..}`, `\include{..}`, `\ref{..}`, `\cref{..}`, `\cite{..}`.
static REFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\(?:input|include|ref|cref|cite)\{([^{}]*)\}").expect("valid reference regex")
});

/// `\includegraphics[opts]{path}` with optional options.
static GRAPHICS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\includegraphics\s*(?:\[[^\]]*\])?\s*\{([^{}]*)\}")
        .expect("valid includegraphics regex")
});

// =============================================================================
// SCAN
// =============================================================================

/// References found in one note's source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    /// Normalized target slugs, self and empty targets excluded.
    pub links: BTreeSet<String>,
    /// Raw `\includegraphics` arguments.
    pub assets: BTreeSet<String>,
}

/// Extract the references a note makes.
///
/// `self_slug` is excluded from the links so a note never links to itself.
#[must_use]
pub fn scan_references(self_slug: &str, content: &str) -> ScanResult {
    let links = REFERENCE_RE
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .map(|m| normalize(m.as_str()))
        .filter(|target| !target.is_empty() && target != self_slug)
        .collect();

    let assets = GRAPHICS_RE
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|path| !path.is_empty())
        .collect();

    ScanResult { links, assets }
}

// =============================================================================
// INDEXER
// =============================================================================

/// Summary returned by a reindex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_notes: usize,
    pub total_connections: usize,
}

/// Rebuilds the link graph from a repository and persists it.
pub struct Indexer {
    repo: Arc<dyn Repository>,
    index_path: PathBuf,
}

impl Indexer {
    /// Create an indexer that reads `repo` and persists to `index_path`.
    pub fn new(repo: Arc<dyn Repository>, index_path: impl Into<PathBuf>) -> Self {
        Self {
            repo,
            index_path: index_path.into(),
        }
    }

    /// Where the snapshot is written.
    #[must_use]
    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Rebuild the whole graph and overwrite the persisted snapshot.
    pub fn reindex(&self) -> Result<IndexStats, VaultError> {
        let index = self.build_index()?;
        save_snapshot(&self.index_path, &index)?;

        let stats = IndexStats {
            total_notes: index.note_count(),
            total_connections: index.connection_count(),
        };
        tracing::info!(
            notes = stats.total_notes,
            connections = stats.total_connections,
            path = %self.index_path.display(),
            "reindex complete"
        );
        Ok(stats)
    }

    /// Build a fresh index without persisting it.
    pub fn build_index(&self) -> Result<Index, VaultError> {
        let headers = self.repo.list_headers()?;

        // Pass 1: per-note scan.
        let mut notes = BTreeMap::new();
        for header in &headers {
            let note = match self.repo.get(&header.slug) {
                Ok(note) => note,
                Err(e) => {
                    tracing::warn!(slug = %header.slug, error = %e, "skipping unreadable note");
                    continue;
                }
            };

            let scan = scan_references(&header.slug, &note.content);
            let mut entry = IndexEntry::from_header(header);
            entry.outgoing_links = scan.links;
            entry.assets = scan.assets;
            notes.insert(header.slug.clone(), entry);
        }

        // Pass 2: invert.
        let mut index = Index {
            last_indexed: Utc::now(),
            notes,
            ..Index::default()
        };
        index.rebuild_backlinks();
        Ok(index)
    }

    /// Load the persisted snapshot, or an empty index if none exists yet.
    pub fn load_index(&self) -> Result<Index, VaultError> {
        Ok(load_snapshot(&self.index_path)?.unwrap_or_default())
    }

    /// Whether a snapshot has been persisted.
    #[must_use]
    pub fn index_exists(&self) -> bool {
        self.index_path.is_file()
    }
}

// =============================================================================
// TESTS
// =============================================================================
