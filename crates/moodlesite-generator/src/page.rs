//! Page file naming and writing.

use std::{fs, path::PathBuf};

use moodlesite_core::ActivityKind;
use tracing::{debug, warn};

use crate::{report::Outcome, state::RunState};

/// Longest sanitized name, in bytes.
const MAX_NAME_BYTES: usize = 200;

/// Device names Windows refuses as file stems.
const RESERVED_NAMES: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Writes activity pages as `<type>_<name>.html`.
#[derive(Debug, Clone)]
pub struct PageWriter {
    html_dir: PathBuf,
    suffix: String,
    sanitize: bool,
}

impl PageWriter {
    /// Create a writer for `html_dir`.
    #[must_use]
    pub fn new(html_dir: impl Into<PathBuf>, suffix: impl Into<String>) -> Self {
        Self {
            html_dir: html_dir.into(),
            suffix: suffix.into(),
            sanitize: true,
        }
    }

    /// Whether activity names are sanitized before use.
    #[must_use]
    pub fn with_sanitize(mut self, sanitize: bool) -> Self {
        self.sanitize = sanitize;
        self
    }

    /// Reserve an unused output path for an activity.
    ///
    /// The duplicate suffix is appended to the name until the path has not
    /// been handed out earlier in this run.
    pub fn reserve_path(&self, name: &str, kind: &ActivityKind, state: &mut RunState) -> PathBuf {
        let mut name = if self.sanitize {
            sanitize_filename(name)
        } else {
            name.to_string()
        };

        let mut path = self.page_path(&name, kind);
        while state.is_page_reserved(&path) {
            name.push_str(&self.suffix);
            path = self.page_path(&name, kind);
        }
        state.reserve_page(path.clone());
        path
    }

    /// Write a finished page, never overwriting an existing file.
    pub fn write(
        &self,
        name: &str,
        kind: &ActivityKind,
        content: &str,
        state: &mut RunState,
    ) -> Outcome {
        let path = self.reserve_path(name, kind, state);

        if path.exists() {
            debug!(path = %path.display(), "page already exists");
            return Outcome::AlreadyExists;
        }

        match fs::write(&path, content) {
            Ok(()) => {
                debug!(path = %path.display(), "wrote page");
                Outcome::Success
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to write page");
                Outcome::Failure
            }
        }
    }

    fn page_path(&self, name: &str, kind: &ActivityKind) -> PathBuf {
        self.html_dir.join(page_filename(name, kind))
    }
}

/// `<type>_<name>.html`
pub fn page_filename(name: &str, kind: &ActivityKind) -> String {
    format!("{}_{name}.html", kind.tag())
}

/// Make a display name usable as a file name on common platforms.
///
/// Removes path separators, `<>:"|?*` and control characters, trims trailing
/// dots and spaces, protects Windows device names and bounds the length.
pub fn sanitize_filename(name: &str) -> String {
    let mut cleaned: String = name
        .chars()
        .filter(|&c| {
            !c.is_control() && !matches!(c, '/' | '\\' | '<' | '>' | ':' | '"' | '|' | '?' | '*')
        })
        .collect();

    if cleaned.len() > MAX_NAME_BYTES {
        let mut end = MAX_NAME_BYTES;
        while !cleaned.is_char_boundary(end) {
            end -= 1;
        }
        cleaned.truncate(end);
    }

    let trimmed = cleaned.trim_end_matches(|c: char| c == '.' || c == ' ').trim_start();
    let stem = trimmed.split('.').next().unwrap_or(trimmed);
    if RESERVED_NAMES.iter().any(|r| r.eq_ignore_ascii_case(stem)) {
        return format!("{trimmed}_");
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Week 1: Intro"), "Week 1 Intro");
        assert_eq!(sanitize_filename("a/b\\c"), "abc");
        assert_eq!(sanitize_filename("What?*\"<>|"), "What");
        assert_eq!(sanitize_filename("tabs\tand\nlines"), "tabsandlines");
        assert_eq!(sanitize_filename("ends with dots..."), "ends with dots");
        assert_eq!(sanitize_filename("con"), "con_");
        assert_eq!(sanitize_filename("Quiz 2"), "Quiz 2");
    }

    #[test]
    fn test_sanitize_truncates_on_char_boundary() {
        let long = "é".repeat(150);
        let cleaned = sanitize_filename(&long);
        assert!(cleaned.len() <= MAX_NAME_BYTES);
        assert!(cleaned.chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_write_and_dedupe() {
        let dir = TempDir::new().unwrap();
        let writer = PageWriter::new(dir.path(), "_");
        let mut state = RunState::new();

        let first = writer.write("Intro", &ActivityKind::Page, "one", &mut state);
        let second = writer.write("Intro", &ActivityKind::Page, "two", &mut state);
        let other_kind = writer.write("Intro", &ActivityKind::Quiz, "three", &mut state);

        assert_eq!(first, Outcome::Success);
        assert_eq!(second, Outcome::Success);
        assert_eq!(other_kind, Outcome::Success);
        assert_eq!(fs::read_to_string(dir.path().join("page_Intro.html")).unwrap(), "one");
        assert_eq!(fs::read_to_string(dir.path().join("page_Intro_.html")).unwrap(), "two");
        assert_eq!(fs::read_to_string(dir.path().join("quiz_Intro.html")).unwrap(), "three");
    }

    #[test]
    fn test_existing_page_not_overwritten() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("page_Intro.html"), "old").unwrap();
        let writer = PageWriter::new(dir.path(), "_");

        let outcome = writer.write("Intro", &ActivityKind::Page, "new", &mut RunState::new());
        assert_eq!(outcome, Outcome::AlreadyExists);
        assert_eq!(fs::read_to_string(dir.path().join("page_Intro.html")).unwrap(), "old");
    }

    #[test]
    fn test_write_failure_reported() {
        let dir = TempDir::new().unwrap();
        let writer = PageWriter::new(dir.path().join("missing"), "_");
        let outcome = writer.write("Intro", &ActivityKind::Page, "x", &mut RunState::new());
        assert_eq!(outcome, Outcome::Failure);
    }

    #[test]
    fn test_unsanitized_names_kept() {
        let dir = TempDir::new().unwrap();
        let writer = PageWriter::new(dir.path(), "_").with_sanitize(false);
        let path = writer.reserve_path("A: B", &ActivityKind::Url, &mut RunState::new());
        assert_eq!(path, dir.path().join("url_A: B.html"));
    }
}
