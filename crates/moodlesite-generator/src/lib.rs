//! moodlesite Generator Library
//!
//! Turns an extracted Moodle backup into a static site.
//!
//! # Modules
//!
//! - [`catalog`] - Content-hash keyed file records built from the file manifest
//! - [`resolver`] - Blob store lookup and collision-safe copying
//! - [`rewriter`] - Plugin-file reference rewriting and page documents
//! - [`quiz`] - Quiz body rendering
//! - [`page`] - Page file naming and writing
//! - [`index`] - Index page generation
//! - [`template`] - String templates for generated documents
//! - [`state`] - Names reserved during a run
//! - [`report`] - Per-item outcomes
//! - [`build`] - Build orchestration

pub mod build;
pub mod catalog;
pub mod index;
pub mod page;
pub mod quiz;
pub mod report;
pub mod resolver;
pub mod rewriter;
pub mod state;
pub mod template;

pub use build::{BuildError, Builder};
pub use catalog::{FileCatalog, FileRecord};
pub use index::SiteIndexer;
pub use page::PageWriter;
pub use quiz::QuizRenderer;
pub use report::{ActivityReport, BuildReport, FileReport, Outcome};
pub use resolver::{FileResolver, ResolvedFiles};
pub use rewriter::ContentRewriter;
pub use state::RunState;
pub use template::{Template, TemplateContext, TemplateRegistry};
