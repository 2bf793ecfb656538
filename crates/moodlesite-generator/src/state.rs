//! Output names reserved during one run.
//!
//! A run must never hand the same output path to two different files or pages.
//! Both sets live only as long as the [`RunState`] that owns them, so runs
//! against different destinations never see each other's reservations.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

/// Reservation sets for a single run.
#[derive(Debug, Default)]
pub struct RunState {
    content_paths: HashSet<PathBuf>,
    page_paths: HashSet<PathBuf>,
}

impl RunState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a resolved file was already given this path during the run.
    pub fn is_content_reserved(&self, path: &Path) -> bool {
        self.content_paths.contains(path)
    }

    /// Reserve a resolved file path; returns `false` if it was already taken.
    pub fn reserve_content(&mut self, path: impl Into<PathBuf>) -> bool {
        self.content_paths.insert(path.into())
    }

    /// Whether a page was already given this path during the run.
    pub fn is_page_reserved(&self, path: &Path) -> bool {
        self.page_paths.contains(path)
    }

    /// Reserve a page path; returns `false` if it was already taken.
    pub fn reserve_page(&mut self, path: impl Into<PathBuf>) -> bool {
        self.page_paths.insert(path.into())
    }

    /// Number of resolved file paths reserved so far.
    pub fn content_count(&self) -> usize {
        self.content_paths.len()
    }

    /// Number of page paths reserved so far.
    pub fn page_count(&self) -> usize {
        self.page_paths.len()
    }
}
