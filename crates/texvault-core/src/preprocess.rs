//! # Reference Preprocessor
//!
//! Rewrites one note into a self-contained artifact the external compiler can
//! typeset from the staging directory.
//!
//! The passes run in order over the full text:
//! 1. [`rewrite_refs`]: `\ref{slug}` to a known note becomes
//!    `\href{./slug.pdf}{Title}`
//! 2. [`resolve_inputs`]: relative `\input`/`\include` paths become absolute
//! 3. [`resolve_graphics`]: `\includegraphics` paths starting with `.` become
//!    absolute
//! 4. [`ensure_hyperref`]: `\usepackage{hyperref}` is present exactly once
//!
//! These are plain text substitutions, not a LaTeX parse: a `\ref` inside a
//! verbatim block or a comment is rewritten like any other. Each pass is a
//! standalone function so the chain can be swapped for a parser without
//! touching callers.
//!
//! The slug → title map is read from the live repository on every call, never
//! from the persisted index.

use crate::primitives::HYPERREF_IMPORT;
use crate::repository::Repository;
use crate::VaultError;
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

// =============================================================================
// PATTERNS
// =============================================================================

static REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\ref\{([^{}]*)\}").expect("valid ref regex"));

static INPUT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\(input|include)\{([^{}]*)\}").expect("valid input regex")
});

static GRAPHICS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\includegraphics(\s*\[[^\]]*\])?\s*\{([^{}]*)\}")
        .expect("valid includegraphics regex")
});

static DOCUMENTCLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\documentclass\s*(?:\[[^\]]*\])?\s*\{[^{}]*\}")
        .expect("valid documentclass regex")
});

// =============================================================================
// PREPROCESSOR
// =============================================================================

/// Produces staged, compilable copies of notes.
pub struct Preprocessor {
    repo: Arc<dyn Repository>,
    notes_dir: PathBuf,
    staging_dir: PathBuf,
}

impl Preprocessor {
    /// Create a preprocessor.
    ///
    /// `notes_dir` should be absolute: it is embedded into rewritten paths.
    pub fn new(
        repo: Arc<dyn Repository>,
        notes_dir: impl Into<PathBuf>,
        staging_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            repo,
            notes_dir: notes_dir.into(),
            staging_dir: staging_dir.into(),
        }
    }

    /// Directory staged artifacts are written to.
    #[must_use]
    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Rewrite a note and write it to the staging directory.
    ///
    /// The staged file keeps the source's base filename. Returns its path.
    ///
    /// # Errors
    /// - `VaultError::NotFound` if the note does not exist
    /// - `VaultError::Io` if the staged file cannot be written
    pub fn process(&self, slug: &str) -> Result<PathBuf, VaultError> {
        let note = self.repo.get(slug)?;
        let titles = self.title_map()?;

        let rendered = self.render(&note.content, &titles);

        std::fs::create_dir_all(&self.staging_dir).map_err(|e| {
            VaultError::io(format!("create {}", self.staging_dir.display()), e)
        })?;
        let staged = self.staging_dir.join(&note.header.filename);
        std::fs::write(&staged, rendered)
            .map_err(|e| VaultError::io(format!("write {}", staged.display()), e))?;

        tracing::debug!(slug = %slug, staged = %staged.display(), "note preprocessed");
        Ok(staged)
    }

    /// Apply every rewrite pass to `content`.
    #[must_use]
    pub fn render(&self, content: &str, titles: &BTreeMap<String, String>) -> String {
        let text = rewrite_refs(content, titles);
        let text = resolve_inputs(&text, &self.notes_dir);
        let text = resolve_graphics(&text, &self.notes_dir);
        ensure_hyperref(&text)
    }

    /// slug → title for every note currently in the repository.
    fn title_map(&self) -> Result<BTreeMap<String, String>, VaultError> {
        Ok(self
            .repo
            .list_headers()?
            .into_iter()
            .map(|h| (h.slug, h.title))
            .collect())
    }
}

// =============================================================================
// REWRITE PASSES
// =============================================================================

/// Replace `\ref{slug}` for known notes with a hyperlink to the note's PDF.
///
/// Unknown targets are assumed to be ordinary labels and left untouched.
/// A title that is just the slug (no `% title:` header) is a file name, not
/// LaTeX, and is escaped; explicit titles are inserted as written.
#[must_use]
pub fn rewrite_refs(text: &str, titles: &BTreeMap<String, String>) -> String {
    REF_RE
        .replace_all(text, |caps: &Captures| {
            let target = &caps[1];
            match titles.get(target) {
                Some(title) if title == target => {
                    format!(r"\href{{./{}.pdf}}{{{}}}", target, escape_latex(title))
                }
                Some(title) => format!(r"\href{{./{}.pdf}}{{{}}}", target, title),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Escape characters LaTeX treats specially in running text.
#[must_use]
pub fn escape_latex(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str(r"\textbackslash{}"),
            '~' => out.push_str(r"\textasciitilde{}"),
            '^' => out.push_str(r"\textasciicircum{}"),
            '_' | '&' | '%' | '$' | '#' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Make relative `\input`/`\include` paths absolute under `notes_dir`.
#[must_use]
pub fn resolve_inputs(text: &str, notes_dir: &Path) -> String {
    INPUT_RE
        .replace_all(text, |caps: &Captures| {
            let command = &caps[1];
            let path = &caps[2];
            if is_absolute(path) {
                caps[0].to_string()
            } else {
                format!(r"\{}{{{}}}", command, rooted(notes_dir, path))
            }
        })
        .into_owned()
}

/// Make `\includegraphics` paths that start with `.` absolute under
/// `notes_dir`. Options are preserved; bare names are left for the
/// compiler's search path.
#[must_use]
pub fn resolve_graphics(text: &str, notes_dir: &Path) -> String {
    GRAPHICS_RE
        .replace_all(text, |caps: &Captures| {
            let options = caps.get(1).map_or("", |m| m.as_str());
            let path = &caps[2];
            if path.starts_with('.') {
                format!(
                    r"\includegraphics{}{{{}}}",
                    options,
                    rooted(notes_dir, path)
                )
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

/// Guarantee the hyperref import.
///
/// No-op when the literal import is already present; otherwise it goes right
/// after the `\documentclass` declaration, or at the very top when there is
/// none.
#[must_use]
pub fn ensure_hyperref(text: &str) -> String {
    if text.contains(HYPERREF_IMPORT) {
        return text.to_string();
    }
    match DOCUMENTCLASS_RE.find(text) {
        Some(m) => {
            let mut out = String::with_capacity(text.len() + HYPERREF_IMPORT.len() + 1);
            out.push_str(&text[..m.end()]);
            out.push('\n');
            out.push_str(HYPERREF_IMPORT);
            out.push_str(&text[m.end()..]);
            out
        }
        None => format!("{}\n{}", HYPERREF_IMPORT, text),
    }
}

fn is_absolute(path: &str) -> bool {
    path.starts_with('/') || Path::new(path).is_absolute()
}

/// `notes_dir/path` with forward slashes and a leading `./` dropped.
fn rooted(notes_dir: &Path, path: &str) -> String {
    let relative = path.strip_prefix("./").unwrap_or(path);
    notes_dir
        .join(relative)
        .to_string_lossy()
        .replace('\\', "/")
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryRepository;
    use crate::{Note, NoteHeader};

    fn titles() -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert("advanced".to_string(), "Advanced Topics".to_string());
        map
    }

    #[test]
    fn known_refs_become_hyperlinks() {
        let out = rewrite_refs(r"See \ref{advanced} and \ref{fig:plot}.", &titles());
        assert_eq!(
            out,
            r"See \href{./advanced.pdf}{Advanced Topics} and \ref{fig:plot}."
        );
    }

    #[test]
    fn slug_titles_are_escaped() {
        let mut titles = BTreeMap::new();
        titles.insert("lab_notes".to_string(), "lab_notes".to_string());
        titles.insert("phase".to_string(), "Phase $T_c$".to_string());

        let out = rewrite_refs(r"\ref{lab_notes} \ref{phase}", &titles);
        assert_eq!(
            out,
            r"\href{./lab_notes.pdf}{lab\_notes} \href{./phase.pdf}{Phase $T_c$}"
        );
    }

    #[test]
    fn escape_latex_specials() {
        assert_eq!(escape_latex("a_b&c%d#e"), r"a\_b\&c\%d\#e");
        assert_eq!(
            escape_latex(r"x\y~z^"),
            r"x\textbackslash{}y\textasciitilde{}z\textasciicircum{}"
        );
        assert_eq!(escape_latex("plain-name"), "plain-name");
    }

    #[test]
    fn cref_and_eqref_are_not_rewritten() {
        let src = r"\cref{advanced} \eqref{advanced}";
        assert_eq!(rewrite_refs(src, &titles()), src);
    }

    #[test]
    fn relative_inputs_are_rooted() {
        let dir = Path::new("/vault/notes");
        let out = resolve_inputs(r"\input{./parts/a} \include{b.tex} \input{/abs/c}", dir);
        assert_eq!(
            out,
            r"\input{/vault/notes/parts/a} \include{/vault/notes/b.tex} \input{/abs/c}"
        );
    }

    #[test]
    fn dotted_graphics_are_rooted_and_keep_options() {
        let dir = Path::new("/vault/notes");
        let out = resolve_graphics(
            r"\includegraphics[width=3cm]{./figs/a.png} \includegraphics{../assets/b.png} \includegraphics{c.png}",
            dir,
        );
        assert_eq!(
            out,
            r"\includegraphics[width=3cm]{/vault/notes/figs/a.png} \includegraphics{/vault/notes/../assets/b.png} \includegraphics{c.png}"
        );
    }

    #[test]
    fn hyperref_injected_after_documentclass() {
        let out = ensure_hyperref("\\documentclass[11pt]{article}\n\\begin{document}");
        assert_eq!(
            out,
            "\\documentclass[11pt]{article}\n\\usepackage{hyperref}\n\\begin{document}"
        );
    }

    #[test]
    fn hyperref_prepended_without_documentclass() {
        assert_eq!(ensure_hyperref("body"), "\\usepackage{hyperref}\nbody");
    }

    #[test]
    fn hyperref_not_duplicated() {
        let src = "\\documentclass{article}\n\\usepackage{hyperref}\n";
        assert_eq!(ensure_hyperref(src), src);
        assert_eq!(ensure_hyperref(&ensure_hyperref("x")), ensure_hyperref("x"));
    }

    #[test]
    fn process_writes_staged_copy_with_source_filename() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = Arc::new(MemoryRepository::new());
        repo.save(&Note::new(
            NoteHeader::new("intro", "20240312-intro.tex", "Intro"),
            "\\documentclass{article}\nSee \\ref{advanced}",
        ))
        .expect("save");
        repo.save(&Note::new(
            NoteHeader::new("advanced", "advanced.tex", "Advanced Topics"),
            "Content",
        ))
        .expect("save");

        let pre = Preprocessor::new(repo.clone(), "/vault/notes", dir.path().join("staging"));
        let staged = pre.process("intro").expect("process");

        assert_eq!(
            staged.file_name().and_then(|n| n.to_str()),
            Some("20240312-intro.tex")
        );
        let text = std::fs::read_to_string(&staged).expect("read");
        assert!(text.contains(r"\href{./advanced.pdf}{Advanced Topics}"));
        assert_eq!(text.matches(HYPERREF_IMPORT).count(), 1);

        // Source untouched, output idempotent.
        assert!(repo.get("intro").expect("get").content.contains(r"\ref{advanced}"));
        let again = pre.process("intro").expect("process");
        assert_eq!(std::fs::read_to_string(again).expect("read"), text);
    }

    #[test]
    fn process_missing_note_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pre = Preprocessor::new(Arc::new(MemoryRepository::new()), "/n", dir.path());
        assert!(matches!(pre.process("ghost"), Err(VaultError::NotFound(_))));
    }

    #[test]
    fn process_unwritable_staging_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").expect("write");

        let repo = Arc::new(MemoryRepository::new());
        repo.insert("a", "body").expect("insert");
        let pre = Preprocessor::new(repo, "/n", blocker.join("staging"));
        assert!(matches!(pre.process("a"), Err(VaultError::Io(_))));
    }
}
