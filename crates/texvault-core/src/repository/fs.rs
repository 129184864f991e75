//! Filesystem-backed repository: one `.tex` file per note.
//!
//! Headers come from leading `%` comment lines:
//!
//! ```text
//! % title: Phase transitions
//! % date: 2024-03-12
//! % tags: physics, notes
//! \documentclass{article}
//! ```
//!
//! Missing fields fall back to the slug (title) and the filename date prefix
//! (date).

use super::Repository;
use crate::formats::write_atomic;
use crate::normalize::{date_prefix, normalize};
use crate::primitives::NOTE_EXTENSION;
use crate::{Note, NoteHeader, VaultError};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Notes stored as `.tex` files directly inside one directory.
#[derive(Debug, Clone)]
pub struct FsRepository {
    notes_dir: PathBuf,
}

impl FsRepository {
    /// Create a repository over `notes_dir`.
    ///
    /// The directory does not need to exist yet; an absent directory lists
    /// as an empty vault.
    #[must_use]
    pub fn new(notes_dir: impl Into<PathBuf>) -> Self {
        Self {
            notes_dir: notes_dir.into(),
        }
    }

    /// The directory this repository reads from.
    #[must_use]
    pub fn notes_dir(&self) -> &Path {
        &self.notes_dir
    }

    /// All note file names, sorted.
    fn note_files(&self) -> Result<Vec<String>, VaultError> {
        let entries = match std::fs::read_dir(&self.notes_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(VaultError::io(
                    format!("list {}", self.notes_dir.display()),
                    e,
                ));
            }
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                VaultError::io(format!("list {}", self.notes_dir.display()), e)
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(NOTE_EXTENSION) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if !name.starts_with('.') {
                    files.push(name.to_string());
                }
            }
        }
        files.sort();
        Ok(files)
    }

    /// Locate the file backing `slug`.
    fn find_file(&self, slug: &str) -> Result<Option<String>, VaultError> {
        Ok(self
            .note_files()?
            .into_iter()
            .find(|name| normalize(name) == slug))
    }

    fn read_note(&self, filename: &str) -> Result<Note, VaultError> {
        let path = self.notes_dir.join(filename);
        let content = std::fs::read_to_string(&path)
            .map_err(|e| VaultError::io(format!("read {}", path.display()), e))?;
        let header = header_for(filename, &content);
        Ok(Note::new(header, content))
    }
}

impl Repository for FsRepository {
    fn list_headers(&self) -> Result<Vec<NoteHeader>, VaultError> {
        let mut headers = Vec::new();
        let mut seen = BTreeSet::new();

        for filename in self.note_files()? {
            let slug = normalize(&filename);
            if slug.is_empty() {
                continue;
            }
            if !seen.insert(slug.clone()) {
                tracing::warn!(
                    slug = %slug,
                    filename = %filename,
                    "duplicate slug in notes directory, keeping the first file"
                );
                continue;
            }
            match self.read_note(&filename) {
                Ok(note) => headers.push(note.header),
                Err(e) => {
                    tracing::warn!(filename = %filename, error = %e, "skipping unreadable note");
                }
            }
        }
        Ok(headers)
    }

    fn get(&self, slug: &str) -> Result<Note, VaultError> {
        let filename = self
            .find_file(slug)?
            .ok_or_else(|| VaultError::NotFound(format!("note '{}'", slug)))?;
        self.read_note(&filename)
    }

    fn exists(&self, slug: &str) -> bool {
        matches!(self.find_file(slug), Ok(Some(_)))
    }

    fn save(&self, note: &Note) -> Result<(), VaultError> {
        let filename = &note.header.filename;
        if filename.contains(['/', '\\']) || normalize(filename).is_empty() {
            return Err(VaultError::InvalidInput(format!(
                "note filename '{}' must be a bare file name",
                filename
            )));
        }
        write_atomic(&self.notes_dir.join(filename), note.content.as_bytes())
    }

    fn delete(&self, slug: &str) -> Result<(), VaultError> {
        let filename = self
            .find_file(slug)?
            .ok_or_else(|| VaultError::NotFound(format!("note '{}'", slug)))?;
        let path = self.notes_dir.join(filename);
        std::fs::remove_file(&path)
            .map_err(|e| VaultError::io(format!("remove {}", path.display()), e))
    }
}

// =============================================================================
// HEADER COMMENTS
// =============================================================================

/// Build a header from a filename and the note source.
fn header_for(filename: &str, content: &str) -> NoteHeader {
    let slug = normalize(filename);
    let fields = parse_header_comments(content);

    let title = fields.title.unwrap_or_else(|| slug.clone());
    let date = fields
        .date
        .or_else(|| date_prefix(filename))
        .unwrap_or_default();

    NoteHeader::new(slug, filename, title)
        .with_date(date)
        .with_tags(fields.tags)
}

/// Fields read from the leading `% key: value` comment block.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct HeaderComments {
    pub title: Option<String>,
    pub date: Option<String>,
    pub tags: Vec<String>,
}

/// Read `% title:`, `% date:` and `% tags:` from the leading comment block.
///
/// Scanning stops at the first line that is neither blank nor a comment.
#[must_use]
pub fn parse_header_comments(content: &str) -> HeaderComments {
    let mut fields = HeaderComments::default();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some(comment) = line.strip_prefix('%') else {
            break;
        };
        let Some((key, value)) = comment.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            "title" if !value.is_empty() => fields.title = Some(value.to_string()),
            "date" if !value.is_empty() => fields.date = Some(value.to_string()),
            "tags" => fields.tags.extend(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(String::from),
            ),
            _ => {}
        }
    }
    fields
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).expect("write");
    }

    #[test]
    fn parses_header_comments() {
        let src = "% title: Phase transitions\n% date: 2024-03-12\n% tags: physics, notes\n\\documentclass{article}\n% title: ignored";
        let fields = parse_header_comments(src);
        assert_eq!(fields.title.as_deref(), Some("Phase transitions"));
        assert_eq!(fields.date.as_deref(), Some("2024-03-12"));
        assert_eq!(fields.tags, vec!["physics", "notes"]);
    }

    #[test]
    fn missing_dir_lists_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = FsRepository::new(dir.path().join("nope"));
        assert!(repo.list_headers().expect("list").is_empty());
    }

    #[test]
    fn lists_only_tex_files_with_fallbacks() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "20240312-intro.tex", "\\section{Intro}");
        write(dir.path(), "advanced.tex", "% title: Advanced Topics\n");
        write(dir.path(), "readme.md", "not a note");

        let repo = FsRepository::new(dir.path());
        let headers = repo.list_headers().expect("list");
        assert_eq!(headers.len(), 2);

        let intro = headers.iter().find(|h| h.slug == "intro").expect("intro");
        assert_eq!(intro.title, "intro");
        assert_eq!(intro.date, "2024-03-12");
        assert_eq!(intro.filename, "20240312-intro.tex");

        let advanced = headers.iter().find(|h| h.slug == "advanced").expect("adv");
        assert_eq!(advanced.title, "Advanced Topics");
        assert!(advanced.tags.is_empty());
    }

    #[test]
    fn get_resolves_dated_files_by_slug() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "20240312-intro.tex", "body");

        let repo = FsRepository::new(dir.path());
        let note = repo.get("intro").expect("get");
        assert_eq!(note.content, "body");
        assert!(repo.exists("intro"));
        assert!(!repo.exists("20240312-intro"));
    }

    #[test]
    fn get_missing_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = FsRepository::new(dir.path());
        assert!(matches!(repo.get("ghost"), Err(VaultError::NotFound(_))));
        assert!(matches!(repo.delete("ghost"), Err(VaultError::NotFound(_))));
    }

    #[test]
    fn save_and_delete() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = FsRepository::new(dir.path());
        let note = Note::new(NoteHeader::new("fresh", "fresh.tex", "Fresh"), "hello");

        repo.save(&note).expect("save");
        assert_eq!(repo.get("fresh").expect("get").content, "hello");

        repo.delete("fresh").expect("delete");
        assert!(!repo.exists("fresh"));
    }

    #[test]
    fn save_rejects_nested_filenames() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = FsRepository::new(dir.path());
        let note = Note::new(NoteHeader::new("x", "../x.tex", "X"), "");
        assert!(matches!(repo.save(&note), Err(VaultError::InvalidInput(_))));
    }
}
