//! Typed readers for the manifests of an extracted backup.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::{
    activity::ActivityKind,
    error::{CoreError, Result},
    question::QuestionInstance,
    xml::Element,
};

/// One record of the file manifest (`files.xml`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub content_hash: String,
    pub filename: String,
    pub context_id: String,
}

impl FileEntry {
    /// Read a `file` element.
    pub fn from_element(element: &Element) -> Result<Self> {
        Ok(Self {
            content_hash: element.require_text("contenthash")?.trim().to_string(),
            filename: element.require_text("filename")?.to_string(),
            context_id: element.require_text("contextid")?.trim().to_string(),
        })
    }

    /// Read every entry of the file manifest, in document order.
    pub fn load_all(path: &Path) -> Result<Vec<Self>> {
        let root = Element::load(path)?;
        let entries = root
            .children()
            .iter()
            .map(Self::from_element)
            .collect::<Result<Vec<_>>>()?;
        info!(count = entries.len(), path = %path.display(), "loaded file manifest");
        Ok(entries)
    }
}

/// One activity listed in the backup manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityEntry {
    pub module_name: String,
    /// Directory of the activity, relative to the backup root.
    pub directory: String,
    /// Display title recorded in the manifest.
    pub title: Option<String>,
}

impl ActivityEntry {
    /// Kind of this activity.
    pub fn kind(&self) -> ActivityKind {
        ActivityKind::from_module_name(&self.module_name)
    }

    /// Path of the activity document (`<directory>/<module>.xml`).
    pub fn document_path(&self, source: &Path) -> PathBuf {
        source
            .join(&self.directory)
            .join(format!("{}.xml", self.module_name))
    }
}

/// The backup manifest (`moodle_backup.xml`).
#[derive(Debug, Clone, Default)]
pub struct BackupManifest {
    /// Declared full name of the course, if any.
    pub course_fullname: Option<String>,
    /// Activities in manifest order.
    pub activities: Vec<ActivityEntry>,
}

impl BackupManifest {
    /// Load the manifest from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let root = Element::load(path)?;
        let manifest = Self::from_root(&root)?;
        info!(
            activities = manifest.activities.len(),
            course = manifest.course_fullname.as_deref().unwrap_or(""),
            "loaded backup manifest"
        );
        Ok(manifest)
    }

    /// Read the manifest from its root element.
    pub fn from_root(root: &Element) -> Result<Self> {
        let information = root
            .child("information")
            .ok_or_else(|| CoreError::missing_field(root.name(), "information"))?;

        let activities = match information.path("contents/activities") {
            Some(list) => list
                .children()
                .iter()
                .map(|activity| {
                    Ok(ActivityEntry {
                        module_name: activity.require_text("modulename")?.trim().to_string(),
                        directory: activity.require_text("directory")?.trim().to_string(),
                        title: activity.child_text("title").map(str::to_string),
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            None => {
                debug!("backup manifest lists no activities");
                Vec::new()
            }
        };

        Ok(Self {
            course_fullname: information
                .child_text("original_course_fullname")
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string),
            activities,
        })
    }
}

/// A parsed per-activity document.
#[derive(Debug, Clone, Default)]
pub struct ActivityDocument {
    pub context_id: String,
    pub name: String,
    pub intro: Option<String>,
    /// Body of `page` activities.
    pub content: Option<String>,
    /// Target of `url` activities.
    pub external_url: Option<String>,
    /// Question placements of `quiz` activities, in document order.
    pub question_instances: Vec<QuestionInstance>,
}

impl ActivityDocument {
    /// Load the document for a manifest entry.
    pub fn load(source: &Path, entry: &ActivityEntry) -> Result<Self> {
        let path = entry.document_path(source);
        debug!(path = %path.display(), "loading activity document");
        let root = Element::load(&path)?;
        Self::from_root(&root, &entry.module_name)
    }

    /// Read the document from its root; the payload is the child named after the module.
    pub fn from_root(root: &Element, module_name: &str) -> Result<Self> {
        let context_id = root.require_attr("contextid")?.to_string();
        let module = root
            .child(module_name)
            .ok_or_else(|| CoreError::missing_field(root.name(), module_name))?;

        let question_instances = match module.child("question_instances") {
            Some(list) => list
                .children()
                .iter()
                .map(QuestionInstance::from_element)
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        Ok(Self {
            context_id,
            name: module.require_text("name")?.to_string(),
            intro: module.child_text("intro").map(str::to_string),
            content: module.child_text("content").map(str::to_string),
            external_url: module.child_text("externalurl").map(str::to_string),
            question_instances,
        })
    }
}
