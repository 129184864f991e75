//! # Link Graph Index
//!
//! The persisted snapshot of how notes reference each other.
//!
//! Nodes are notes, edges are outgoing references, and backlinks are the
//! inverse edges. The snapshot is rebuilt from scratch on every reindex and
//! is never patched incrementally, so `backlinks` is always the exact
//! transpose of `outgoing_links` restricted to notes that exist.
//!
//! All collections are `BTreeMap`/`BTreeSet`: two reindexes of the same
//! corpus produce identical graph content (only `last_indexed` differs).

mod export;
mod indexer;

pub use export::{GraphEdge, GraphNode, GraphView};
pub use indexer::{IndexStats, Indexer, ScanResult, scan_references};

use crate::NoteHeader;
use crate::primitives::INDEX_VERSION;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// INDEX ENTRY
// =============================================================================

/// Snapshot of one note inside the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub title: String,
    pub date: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub filename: String,
    /// Normalized reference targets, self excluded. May name missing notes.
    #[serde(default)]
    pub outgoing_links: BTreeSet<String>,
    /// Notes whose `outgoing_links` contain this note.
    #[serde(default)]
    pub backlinks: BTreeSet<String>,
    /// Graphics paths exactly as written in `\includegraphics`.
    #[serde(default)]
    pub assets: BTreeSet<String>,
}

impl IndexEntry {
    /// Entry for `header` with no links yet.
    #[must_use]
    pub fn from_header(header: &NoteHeader) -> Self {
        Self {
            title: header.title.clone(),
            date: header.date.clone(),
            tags: header.tags.clone(),
            filename: header.filename.clone(),
            outgoing_links: BTreeSet::new(),
            backlinks: BTreeSet::new(),
            assets: BTreeSet::new(),
        }
    }
}

// =============================================================================
// INDEX
// =============================================================================

/// The whole link graph snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    pub version: String,
    pub last_indexed: DateTime<Utc>,
    pub notes: BTreeMap<String, IndexEntry>,
}

impl Default for Index {
    fn default() -> Self {
        Self {
            version: INDEX_VERSION.to_string(),
            last_indexed: DateTime::<Utc>::default(),
            notes: BTreeMap::new(),
        }
    }
}

impl Index {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute every entry's backlinks from the outgoing links.
    ///
    /// Existing backlinks are discarded first. Edges pointing at slugs that
    /// are not in `notes` contribute nothing.
    pub fn rebuild_backlinks(&mut self) {
        for entry in self.notes.values_mut() {
            entry.backlinks.clear();
        }

        let edges: Vec<(String, String)> = self
            .notes
            .iter()
            .flat_map(|(source, entry)| {
                entry
                    .outgoing_links
                    .iter()
                    .map(move |target| (source.clone(), target.clone()))
            })
            .collect();

        for (source, target) in edges {
            if let Some(target_entry) = self.notes.get_mut(&target) {
                target_entry.backlinks.insert(source);
            }
        }
    }

    /// Number of notes.
    #[must_use]
    pub fn note_count(&self) -> usize {
        self.notes.len()
    }

    /// Number of outgoing edges, dangling ones included.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.notes.values().map(|e| e.outgoing_links.len()).sum()
    }

    /// Backlinks of `slug`, or `None` if the note is not indexed.
    #[must_use]
    pub fn backlinks(&self, slug: &str) -> Option<&BTreeSet<String>> {
        self.notes.get(slug).map(|e| &e.backlinks)
    }

    /// Outgoing links of `slug`, or `None` if the note is not indexed.
    #[must_use]
    pub fn outgoing(&self, slug: &str) -> Option<&BTreeSet<String>> {
        self.notes.get(slug).map(|e| &e.outgoing_links)
    }

    /// Every source note with the targets it references that do not exist.
    #[must_use]
    pub fn broken_links(&self) -> BTreeMap<String, BTreeSet<String>> {
        self.notes
            .iter()
            .filter_map(|(slug, entry)| {
                let dangling: BTreeSet<String> = entry
                    .outgoing_links
                    .iter()
                    .filter(|t| !self.notes.contains_key(*t))
                    .cloned()
                    .collect();
                (!dangling.is_empty()).then(|| (slug.clone(), dangling))
            })
            .collect()
    }

    /// Number of dangling edges, counted per reference rather than per source.
    #[must_use]
    pub fn broken_link_count(&self) -> usize {
        self.broken_links().values().map(BTreeSet::len).sum()
    }

    /// Notes connected to no other existing note in either direction.
    #[must_use]
    pub fn orphans(&self) -> Vec<String> {
        self.notes
            .iter()
            .filter(|(_, entry)| {
                entry.backlinks.is_empty()
                    && !entry
                        .outgoing_links
                        .iter()
                        .any(|t| self.notes.contains_key(t))
            })
            .map(|(slug, _)| slug.clone())
            .collect()
    }

    /// Notes whose `\includegraphics` paths end with `asset`.
    #[must_use]
    pub fn notes_using_asset(&self, asset: &str) -> Vec<String> {
        self.notes
            .iter()
            .filter(|(_, entry)| {
                entry.assets.iter().any(|path| {
                    path == asset
                        || path
                            .replace('\\', "/")
                            .rsplit('/')
                            .next()
                            .is_some_and(|name| name == asset)
                })
            })
            .map(|(slug, _)| slug.clone())
            .collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================
