//! File catalog keyed by content hash.
//!
//! Moodle stores every distinct file content once in the blob store, but the
//! same content may be attached under several names and in several contexts.
//! A [`FileRecord`] gathers all of them for one hash.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    path::PathBuf,
};

use moodlesite_core::FileEntry;
use tracing::{debug, info};

/// Filename Moodle uses for directory placeholders in the file manifest.
const DIRECTORY_PLACEHOLDER: &str = ".";

/// All names and contexts sharing one content hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    hash: String,
    /// Original name -> output name (differs once a collision renamed it).
    names: BTreeMap<String, String>,
    initial_name: String,
    context_ids: BTreeSet<String>,
    location: Option<PathBuf>,
}

impl FileRecord {
    /// Create a record seeded with its first name and context.
    pub fn new(
        hash: impl Into<String>,
        name: impl Into<String>,
        context_id: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            hash: hash.into(),
            names: BTreeMap::from([(name.clone(), name.clone())]),
            initial_name: name,
            context_ids: BTreeSet::from([context_id.into()]),
            location: None,
        }
    }

    /// Add an alias; a no-op if the name is already known.
    pub fn add_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.names.entry(name.clone()).or_insert(name);
    }

    /// Add a context the file is attached to.
    pub fn add_context(&mut self, context_id: impl Into<String>) {
        self.context_ids.insert(context_id.into());
    }

    /// Record the blob store directory holding this file's content.
    pub fn locate(&mut self, dir: impl Into<PathBuf>) {
        self.location = Some(dir.into());
    }

    pub fn is_located(&self) -> bool {
        self.location.is_some()
    }

    /// Path of the underlying blob, once located.
    pub fn blob_path(&self) -> Option<PathBuf> {
        self.location.as_ref().map(|dir| dir.join(&self.hash))
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// First name ever seen for this content.
    pub fn initial_name(&self) -> &str {
        &self.initial_name
    }

    /// Whether `original` is one of this record's names.
    pub fn has_name(&self, original: &str) -> bool {
        self.names.contains_key(original)
    }

    /// Output name for an original name.
    pub fn resolved_name(&self, original: &str) -> Option<&str> {
        self.names.get(original).map(String::as_str)
    }

    /// Output name of the initial name.
    pub fn resolved_initial_name(&self) -> &str {
        self.resolved_name(&self.initial_name)
            .unwrap_or(&self.initial_name)
    }

    /// Original names in sorted order.
    pub fn original_names(&self) -> impl Iterator<Item = &str> {
        self.names.keys().map(String::as_str)
    }

    /// `(original, output)` name pairs.
    pub fn names(&self) -> impl Iterator<Item = (&str, &str)> {
        self.names.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Contexts in sorted order.
    pub fn context_ids(&self) -> impl Iterator<Item = &str> {
        self.context_ids.iter().map(String::as_str)
    }

    /// Point an original name at a new output name.
    pub(crate) fn rename(&mut self, original: &str, renamed: String) {
        if let Some(name) = self.names.get_mut(original) {
            *name = renamed;
        }
    }
}

/// Content hash -> [`FileRecord`] mapping.
#[derive(Debug, Clone, Default)]
pub struct FileCatalog {
    records: HashMap<String, FileRecord>,
}

impl FileCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from manifest entries, in order.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a FileEntry>) -> Self {
        let mut catalog = Self::new();
        for entry in entries {
            catalog.add(entry);
        }
        info!(files = catalog.len(), "built file catalog");
        catalog
    }

    /// Merge one manifest entry into the catalog.
    pub fn add(&mut self, entry: &FileEntry) {
        if entry.filename == DIRECTORY_PLACEHOLDER {
            debug!(context = %entry.context_id, "skipping directory entry");
            return;
        }

        match self.records.get_mut(&entry.content_hash) {
            Some(record) => {
                record.add_name(&entry.filename);
                record.add_context(&entry.context_id);
            }
            None => {
                self.records.insert(
                    entry.content_hash.clone(),
                    FileRecord::new(&entry.content_hash, &entry.filename, &entry.context_id),
                );
            }
        }
    }

    pub fn get(&self, hash: &str) -> Option<&FileRecord> {
        self.records.get(hash)
    }

    pub fn get_mut(&mut self, hash: &str) -> Option<&mut FileRecord> {
        self.records.get_mut(hash)
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.records.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records, in no particular order.
    pub fn records(&self) -> impl Iterator<Item = &FileRecord> {
        self.records.values()
    }
}
