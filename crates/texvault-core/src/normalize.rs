//! # Reference Normalizer
//!
//! Turns the raw argument of a cross-reference command into a note slug.
//!
//! `\input{../notes/20240312-intro.tex}`, `\ref{intro}` and
//! `\include{sub\intro}` all name the same note: `intro`.
//!
//! These functions are pure and never fail. An empty result means the token
//! does not name a note.

use crate::primitives::{DATE_PREFIX_DIGITS, NOTE_EXTENSION};

/// Canonicalize a raw reference token into a slug.
///
/// Steps, in order:
/// 1. `\` separators become `/`
/// 2. keep the last path segment
/// 3. strip a trailing `.tex`
/// 4. strip a leading `YYYYMMDD-` date prefix
/// 5. trim surrounding whitespace
#[must_use]
pub fn normalize(raw: &str) -> String {
    let unified = raw.replace('\\', "/");
    let segment = unified.rsplit('/').next().unwrap_or_default();
    let stem = segment
        .strip_suffix(&format!(".{NOTE_EXTENSION}"))
        .unwrap_or(segment);
    strip_date_prefix(stem).trim().to_string()
}

/// Strip a `YYYYMMDD-` prefix if present.
fn strip_date_prefix(s: &str) -> &str {
    if has_date_prefix(s) {
        &s[DATE_PREFIX_DIGITS + 1..]
    } else {
        s
    }
}

fn has_date_prefix(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() > DATE_PREFIX_DIGITS
        && bytes[..DATE_PREFIX_DIGITS].iter().all(u8::is_ascii_digit)
        && bytes[DATE_PREFIX_DIGITS] == b'-'
}

/// Extract a filename's date prefix formatted as `YYYY-MM-DD`.
///
/// Returns `None` when the name carries no prefix.
#[must_use]
pub fn date_prefix(filename: &str) -> Option<String> {
    if !has_date_prefix(filename) {
        return None;
    }
    let d = &filename[..DATE_PREFIX_DIGITS];
    Some(format!("{}-{}-{}", &d[0..4], &d[4..6], &d[6..8]))
}

/// Slugify free text for use as a file name.
///
/// Lower-cases, maps every non-alphanumeric run to a single `-` and trims
/// leading/trailing hyphens. `"Phase Diagram (v2)"` becomes
/// `"phase-diagram-v2"`.
#[must_use]
pub fn slugify(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<&str>>()
        .join("-")
}

// =============================================================================
// TESTS
// =============================================================================
