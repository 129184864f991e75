//! In-memory repository.

use super::Repository;
use crate::{Note, NoteHeader, VaultError};
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Notes held in a map keyed by slug.
///
/// Used by tests and by callers that assemble a corpus programmatically.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    notes: RwLock<BTreeMap<String, Note>>,
}

impl MemoryRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a repository from notes.
    #[must_use]
    pub fn with_notes(notes: impl IntoIterator<Item = Note>) -> Self {
        let map = notes
            .into_iter()
            .map(|n| (n.header.slug.clone(), n))
            .collect();
        Self {
            notes: RwLock::new(map),
        }
    }

    /// Insert a note whose filename is `<slug>.tex` and title equals the slug.
    pub fn insert(&self, slug: &str, content: &str) -> Result<(), VaultError> {
        let header = NoteHeader::new(slug, format!("{slug}.tex"), slug);
        self.save(&Note::new(header, content))
    }
}

fn poisoned() -> VaultError {
    VaultError::Io("note map lock poisoned".to_string())
}

impl Repository for MemoryRepository {
    fn list_headers(&self) -> Result<Vec<NoteHeader>, VaultError> {
        let notes = self.notes.read().map_err(|_| poisoned())?;
        Ok(notes.values().map(|n| n.header.clone()).collect())
    }

    fn get(&self, slug: &str) -> Result<Note, VaultError> {
        let notes = self.notes.read().map_err(|_| poisoned())?;
        notes
            .get(slug)
            .cloned()
            .ok_or_else(|| VaultError::NotFound(format!("note '{}'", slug)))
    }

    fn exists(&self, slug: &str) -> bool {
        self.notes
            .read()
            .map(|notes| notes.contains_key(slug))
            .unwrap_or(false)
    }

    fn save(&self, note: &Note) -> Result<(), VaultError> {
        let mut notes = self.notes.write().map_err(|_| poisoned())?;
        notes.insert(note.header.slug.clone(), note.clone());
        Ok(())
    }

    fn delete(&self, slug: &str) -> Result<(), VaultError> {
        let mut notes = self.notes.write().map_err(|_| poisoned())?;
        notes
            .remove(slug)
            .map(|_| ())
            .ok_or_else(|| VaultError::NotFound(format!("note '{}'", slug)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crud_roundtrip() {
        let repo = MemoryRepository::new();
        repo.insert("a", "alpha").expect("insert");

        assert!(repo.exists("a"));
        assert_eq!(repo.get("a").expect("get").content, "alpha");
        assert_eq!(repo.list_headers().expect("list").len(), 1);

        repo.delete("a").expect("delete");
        assert!(!repo.exists("a"));
        assert!(repo.get("a").is_err());
    }

    #[test]
    fn headers_are_listed_in_slug_order() {
        let repo = MemoryRepository::new();
        repo.insert("zeta", "").expect("insert");
        repo.insert("alpha", "").expect("insert");

        let slugs: Vec<_> = repo
            .list_headers()
            .expect("list")
            .into_iter()
            .map(|h| h.slug)
            .collect();
        assert_eq!(slugs, vec!["alpha", "zeta"]);
    }
}
