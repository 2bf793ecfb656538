//! Index page generation.
//!
//! The index is rebuilt from the pages on disk rather than from the run's own
//! records, so it also covers pages kept from earlier runs.

use std::{
    cmp::Ordering,
    collections::BTreeMap,
    fs,
    path::PathBuf,
};

use moodlesite_core::ActivityKind;
use quick_xml::escape::escape;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::template::{TemplateContext, TemplateError, TemplateRegistry};

/// Name of the generated index page.
pub const INDEX_FILE: &str = "index.html";

/// Index generation errors.
#[derive(Debug, Error)]
pub enum IndexError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Directory traversal error.
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// Template error.
    #[error("template error: {0}")]
    Template(#[from] TemplateError),
}

/// Result type for index generation.
pub type Result<T> = std::result::Result<T, IndexError>;

/// A generated page found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub kind: ActivityKind,
    pub filename: String,
    /// Text of the page's `<title>`, as written.
    pub title: String,
}

/// Builds `index.html` from the pages in the html directory.
#[derive(Debug, Clone)]
pub struct SiteIndexer {
    html_dir: PathBuf,
    fallback_title: String,
    templates: TemplateRegistry,
}

impl SiteIndexer {
    #[must_use]
    pub fn new(html_dir: impl Into<PathBuf>, fallback_title: impl Into<String>) -> Self {
        Self {
            html_dir: html_dir.into(),
            fallback_title: fallback_title.into(),
            templates: TemplateRegistry::new(),
        }
    }

    /// Collect every `<type>_<name>.html` page of a supported type.
    pub fn scan(&self) -> Result<Vec<IndexEntry>> {
        let mut entries = Vec::new();

        let walker = WalkDir::new(&self.html_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name();

        for entry in walker {
            let entry = entry?;
            let Some(filename) = entry.file_name().to_str() else {
                continue;
            };
            let Some(kind) = page_kind(filename) else {
                continue;
            };

            let html = match fs::read_to_string(entry.path()) {
                Ok(html) => html,
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "skipping unreadable page");
                    continue;
                }
            };
            let Some(title) = extract_title(&html) else {
                debug!(filename, "skipping page without title");
                continue;
            };

            entries.push(IndexEntry {
                kind,
                filename: filename.to_string(),
                title: title.to_string(),
            });
        }

        Ok(entries)
    }

    /// Render the index document for the given entries.
    ///
    /// Groups are ordered by label and pages within a group by natural order
    /// of their file names.
    pub fn render(&self, course_title: Option<&str>, entries: &[IndexEntry]) -> Result<String> {
        let mut groups: BTreeMap<&str, Vec<&IndexEntry>> = BTreeMap::new();
        for entry in entries {
            groups.entry(entry.kind.label()).or_default().push(entry);
        }

        let mut html = String::new();
        for (label, mut pages) in groups {
            pages.sort_by(|a, b| {
                natural_cmp(&a.filename, &b.filename).then_with(|| a.filename.cmp(&b.filename))
            });

            html.push_str(&format!("<h2>{}</h2>\n<ul>\n", escape(label)));
            for page in pages {
                html.push_str(&format!(
                    "<li><a href=\"{}\">{}</a></li>\n",
                    escape(page.filename.as_str()),
                    page.title
                ));
            }
            html.push_str("</ul>\n");
        }

        let title = course_title.unwrap_or(&self.fallback_title);
        let ctx = TemplateContext::new()
            .with_var("title", escape(title))
            .with_var("groups", html);
        Ok(self.templates.render("index", &ctx)?)
    }

    /// Scan, render and write `index.html`.
    ///
    /// Returns `false` when an identical index is already on disk.
    pub fn write(&self, course_title: Option<&str>) -> Result<bool> {
        let entries = self.scan()?;
        let html = self.render(course_title, &entries)?;
        let path = self.index_path();

        if fs::read_to_string(&path).is_ok_and(|existing| existing == html) {
            debug!(path = %path.display(), "index unchanged");
            return Ok(false);
        }

        fs::write(&path, html)?;
        info!(pages = entries.len(), path = %path.display(), "wrote index");
        Ok(true)
    }

    /// Location of the index page.
    pub fn index_path(&self) -> PathBuf {
        self.html_dir.join(INDEX_FILE)
    }
}

/// Activity kind encoded in a page file name, if it is one of ours.
fn page_kind(filename: &str) -> Option<ActivityKind> {
    let stem = filename.strip_suffix(".html")?;
    let (tag, _) = stem.split_once('_')?;
    ActivityKind::supported(tag)
}

/// Text between the first `<title>` and the first `</title>`.
///
/// `None` when either marker is missing or the closing one comes first.
pub fn extract_title(html: &str) -> Option<&str> {
    const OPEN: &str = "<title>";
    let start = html.find(OPEN)? + OPEN.len();
    let end = html.find("</title>")?;
    html.get(start..end)
}

/// Compare strings with digit runs ordered by numeric value.
///
/// `"Quiz 2"` sorts before `"Quiz 10"`. Runs that are not both numeric compare
/// as plain text.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = chunks(a);
    let mut right = chunks(b);

    loop {
        match (left.next(), right.next()) {
            (Some(x), Some(y)) => {
                let ordering = match (is_digits(x), is_digits(y)) {
                    (true, true) => cmp_numeric(x, y),
                    _ => x.cmp(y),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (None, None) => return Ordering::Equal,
        }
    }
}

/// Split into alternating runs of ASCII digits and everything else.
fn chunks(s: &str) -> impl Iterator<Item = &str> {
    let mut rest = s;
    std::iter::from_fn(move || {
        let first = rest.chars().next()?;
        let digit = first.is_ascii_digit();
        let end = rest
            .find(|c: char| c.is_ascii_digit() != digit)
            .unwrap_or(rest.len());
        let (chunk, tail) = rest.split_at(end);
        rest = tail;
        Some(chunk)
    })
}

fn is_digits(chunk: &str) -> bool {
    chunk.bytes().all(|b| b.is_ascii_digit())
}

/// Compare digit runs by value without parsing, so any length works.
fn cmp_numeric(x: &str, y: &str) -> Ordering {
    let x = x.trim_start_matches('0');
    let y = y.trim_start_matches('0');
    x.len().cmp(&y.len()).then_with(|| x.cmp(y))
}
