//! Build orchestration.
//!
//! Coordinates a full run: resolve files, render every activity, then index.

use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
    time::Instant,
};

use moodlesite_core::{
    ActivityDocument, ActivityEntry, ActivityKind, BackupManifest, Config, CoreError, FileEntry,
    QuestionBank,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    catalog::{FileCatalog, FileRecord},
    index::{IndexError, SiteIndexer},
    page::PageWriter,
    quiz::{QuizError, QuizRenderer},
    report::{ActivityReport, BuildReport, Outcome},
    resolver::{FileResolver, ResolveError, ResolvedFiles},
    rewriter::{ContentRewriter, RewriteError},
    state::RunState,
};

/// Separator between an intro and the main text of a page.
const SECTION_BREAK: &str = "\n<br><br>\n";

/// Build errors.
#[derive(Debug, Error)]
pub enum BuildError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Backup reading error.
    #[error("backup error: {0}")]
    Core(#[from] CoreError),

    /// File resolution error.
    #[error("resolve error: {0}")]
    Resolve(#[from] ResolveError),

    /// Rewriting error.
    #[error("rewrite error: {0}")]
    Rewrite(#[from] RewriteError),

    /// Quiz rendering error.
    #[error("quiz error: {0}")]
    Quiz(#[from] QuizError),

    /// Index generation error.
    #[error("index error: {0}")]
    Index(#[from] IndexError),
}

/// Result type for build operations.
pub type Result<T> = std::result::Result<T, BuildError>;

/// Site builder that orchestrates a run over one extracted backup.
#[derive(Debug)]
pub struct Builder {
    config: Config,
    source: PathBuf,
    dest: PathBuf,
}

impl Builder {
    /// Create a builder reading `source` and writing under `dest`.
    #[must_use]
    pub fn new(config: Config, source: impl Into<PathBuf>, dest: impl Into<PathBuf>) -> Self {
        Self {
            config,
            source: source.into(),
            dest: dest.into(),
        }
    }

    /// Directory resolved files are copied to.
    pub fn content_dir(&self) -> PathBuf {
        self.dest.join(&self.config.layout.content_dir)
    }

    /// Directory pages are written to.
    pub fn html_dir(&self) -> PathBuf {
        self.dest.join(&self.config.layout.html_dir)
    }

    /// Execute the full run.
    ///
    /// Problems with single files or activities are reported and skipped;
    /// only unreadable manifests or an unusable destination abort the run.
    pub fn build(&self) -> Result<BuildReport> {
        let start = Instant::now();
        let mut report = BuildReport::default();
        let mut state = RunState::new();

        info!(
            source = %self.source.display(),
            dest = %self.dest.display(),
            "starting build"
        );

        // 1. Prepare output directories
        self.prepare_output()?;

        // 2. Catalog and resolve files
        let layout = &self.config.layout;
        let entries = FileEntry::load_all(&self.source.join(&layout.files_manifest))?;
        let mut catalog = FileCatalog::from_entries(&entries);
        let resolver = FileResolver::new(self.content_dir(), &self.config.naming.duplicate_suffix);
        let resolved = resolver.resolve(
            &mut catalog,
            &self.source.join(&layout.blob_dir),
            &mut state,
            &mut report.files,
        )?;

        // 3. Load activities and questions
        let manifest = BackupManifest::load(&self.source.join(&layout.backup_manifest))?;
        let bank = QuestionBank::load(&self.source.join(&layout.questions_manifest))?;

        // 4. Render activities
        let pipeline = ActivityPipeline {
            source: &self.source,
            catalog: &catalog,
            resolved: &resolved,
            bank: &bank,
            rewriter: self.rewriter(),
            writer: PageWriter::new(self.html_dir(), &self.config.naming.duplicate_suffix)
                .with_sanitize(self.config.naming.sanitize),
            quiz: QuizRenderer::new(),
        };
        for entry in &manifest.activities {
            report.activities.push(pipeline.process(entry, &mut state));
        }

        // 5. Index
        report.index_written = self.write_index(manifest.course_fullname.as_deref())?;

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            files = report.file_count(Outcome::Success),
            pages = report.activity_count(Outcome::Success),
            failed = report.activity_count(Outcome::Failure),
            reserved_files = state.content_count(),
            reserved_pages = state.page_count(),
            duration_ms = report.duration_ms,
            "build complete"
        );

        Ok(report)
    }

    /// Regenerate only the index page of an existing output directory.
    ///
    /// The course name is read from the backup manifest when one is present.
    pub fn reindex(&self) -> Result<bool> {
        let manifest_path = self.source.join(&self.config.layout.backup_manifest);
        let course = if manifest_path.exists() {
            BackupManifest::load(&manifest_path)?.course_fullname
        } else {
            debug!(path = %manifest_path.display(), "no backup manifest, using fallback title");
            None
        };
        self.write_index(course.as_deref())
    }

    fn write_index(&self, course: Option<&str>) -> Result<bool> {
        let indexer = SiteIndexer::new(self.html_dir(), &self.config.site.fallback_title);
        Ok(indexer.write(course)?)
    }

    fn rewriter(&self) -> ContentRewriter {
        let rewriter = ContentRewriter::new(self.config.layout.content_dir.as_str());
        if self.config.render.math {
            rewriter.with_math_scripts(self.config.render.math_scripts.clone())
        } else {
            rewriter
        }
    }

    /// Create the content and html directories and the link between them.
    fn prepare_output(&self) -> Result<()> {
        let content_dir = self.content_dir();
        let html_dir = self.html_dir();
        fs::create_dir_all(&content_dir)?;
        fs::create_dir_all(&html_dir)?;

        if self.config.layout.link_content {
            let link = html_dir.join(&self.config.layout.content_dir);
            if fs::symlink_metadata(&link).is_err() {
                let target = fs::canonicalize(&content_dir)?;
                link_dir(&target, &link)?;
                debug!(link = %link.display(), target = %target.display(), "linked content directory");
            }
        }
        Ok(())
    }
}

#[cfg(unix)]
fn link_dir(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn link_dir(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link)
}

#[cfg(not(any(unix, windows)))]
fn link_dir(_target: &Path, link: &Path) -> std::io::Result<()> {
    warn!(link = %link.display(), "directory links unsupported on this platform");
    Ok(())
}

/// Everything needed to turn one manifest entry into a page.
struct ActivityPipeline<'a> {
    source: &'a Path,
    catalog: &'a FileCatalog,
    resolved: &'a ResolvedFiles,
    bank: &'a QuestionBank,
    rewriter: ContentRewriter,
    writer: PageWriter,
    quiz: QuizRenderer,
}

impl ActivityPipeline<'_> {
    fn process(&self, entry: &ActivityEntry, state: &mut RunState) -> ActivityReport {
        let kind = entry.kind();
        if !kind.is_supported() {
            debug!(module = %kind, "skipping unsupported activity");
            return ActivityReport {
                kind,
                name: fallback_name(entry),
                outcome: Outcome::Unsupported,
            };
        }

        let (name, outcome) = match self.render(entry, &kind) {
            Ok((name, html)) => {
                let outcome = self.writer.write(&name, &kind, &html, state);
                (name, outcome)
            }
            Err(e) => {
                warn!(module = %kind, directory = %entry.directory, error = %e, "failed to process activity");
                (fallback_name(entry), Outcome::Failure)
            }
        };

        ActivityReport {
            kind,
            name,
            outcome,
        }
    }

    /// Load and render an activity, returning its name and page document.
    fn render(&self, entry: &ActivityEntry, kind: &ActivityKind) -> Result<(String, String)> {
        let doc = ActivityDocument::load(self.source, entry)?;
        let body = self.body(kind, &doc)?;

        let own = self.resolved.records(self.catalog, &doc.context_id);
        let shared = match kind {
            ActivityKind::Quiz => self.question_files(&doc),
            _ => Vec::new(),
        };

        let html = self.rewriter.render(&doc.name, &body, &own, &shared)?;
        Ok((doc.name, html))
    }

    /// Raw page body for an activity, before reference rewriting.
    fn body(&self, kind: &ActivityKind, doc: &ActivityDocument) -> Result<String> {
        let intro = doc.intro.as_deref().unwrap_or_default();

        let body = match kind {
            ActivityKind::Page => {
                let content = doc.content.as_deref().unwrap_or_default();
                if intro.is_empty() {
                    content.to_string()
                } else {
                    format!("{intro}{SECTION_BREAK}{content}")
                }
            }
            ActivityKind::Url => format!(
                "<a href=\"{}\">{}</a>",
                doc.external_url.as_deref().unwrap_or_default(),
                doc.name
            ),
            ActivityKind::Quiz => {
                self.quiz
                    .render(doc.intro.as_deref(), &doc.question_instances, self.bank)?
            }
            _ => intro.to_string(),
        };

        if body.trim().is_empty() {
            Ok(kind.placeholder())
        } else {
            Ok(body)
        }
    }

    /// Files of the question categories a quiz draws from, other than its own context.
    fn question_files(&self, doc: &ActivityDocument) -> Vec<&FileRecord> {
        let contexts: BTreeSet<&str> = doc
            .question_instances
            .iter()
            .filter_map(|instance| self.bank.resolve(&instance.question))
            .filter_map(|question| question.context_id.as_deref())
            .filter(|context| *context != doc.context_id)
            .collect();

        contexts
            .into_iter()
            .flat_map(|context| self.resolved.records(self.catalog, context))
            .collect()
    }
}

fn fallback_name(entry: &ActivityEntry) -> String {
    entry
        .title
        .clone()
        .unwrap_or_else(|| entry.directory.clone())
}
