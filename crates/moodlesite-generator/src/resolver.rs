//! Blob store resolution and collision-safe copying.
//!
//! The blob store is a directory of buckets, each holding files named by their
//! content hash. Every catalogued hash found there is copied into the content
//! directory once per alias, under a name no other file of the run has used.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::{
    catalog::{FileCatalog, FileRecord},
    report::{FileReport, Outcome},
    state::RunState,
};

/// Resolution errors.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Directory traversal error.
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// The blob store directory does not exist.
    #[error("blob store not found: {0}")]
    MissingBlobStore(PathBuf),

    /// Copy requested for a record that was never located.
    #[error("file {hash} has not been located in the blob store")]
    Unlocated { hash: String },
}

/// Result type for resolution.
pub type Result<T> = std::result::Result<T, ResolveError>;

/// Resolved file hashes grouped by context.
#[derive(Debug, Clone, Default)]
pub struct ResolvedFiles {
    by_context: HashMap<String, Vec<String>>,
}

impl ResolvedFiles {
    /// Record that a resolved file belongs to a context; each hash is kept once.
    pub fn add(&mut self, context_id: &str, hash: &str) {
        let hashes = self.by_context.entry(context_id.to_string()).or_default();
        if !hashes.iter().any(|h| h == hash) {
            hashes.push(hash.to_string());
        }
    }

    /// Hashes resolved for a context, in resolution order.
    pub fn hashes(&self, context_id: &str) -> &[String] {
        self.by_context
            .get(context_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Records resolved for a context, in resolution order.
    pub fn records<'a>(&self, catalog: &'a FileCatalog, context_id: &str) -> Vec<&'a FileRecord> {
        self.hashes(context_id)
            .iter()
            .filter_map(|hash| catalog.get(hash))
            .collect()
    }

    /// Number of contexts with at least one file.
    pub fn context_count(&self) -> usize {
        self.by_context.len()
    }
}

/// Copies located blobs into the content directory.
#[derive(Debug, Clone)]
pub struct FileResolver {
    content_dir: PathBuf,
    suffix: String,
}

impl FileResolver {
    /// Create a resolver writing into `content_dir`.
    #[must_use]
    pub fn new(content_dir: impl Into<PathBuf>, suffix: impl Into<String>) -> Self {
        Self {
            content_dir: content_dir.into(),
            suffix: suffix.into(),
        }
    }

    /// Locate every catalogued hash under `blob_root` and copy it out.
    ///
    /// Only entries directly inside the immediate subdirectories of `blob_root`
    /// are considered. Per-alias outcomes are appended to `reports`.
    pub fn resolve(
        &self,
        catalog: &mut FileCatalog,
        blob_root: &Path,
        state: &mut RunState,
        reports: &mut Vec<FileReport>,
    ) -> Result<ResolvedFiles> {
        if !blob_root.is_dir() {
            return Err(ResolveError::MissingBlobStore(blob_root.to_path_buf()));
        }

        info!(dir = %blob_root.display(), "resolving files");
        let mut resolved = ResolvedFiles::default();

        let walker = WalkDir::new(blob_root)
            .min_depth(2)
            .max_depth(2)
            .sort_by_file_name();

        for entry in walker {
            let entry = entry?;
            let Some(hash) = entry.file_name().to_str() else {
                continue;
            };
            let Some(record) = catalog.get_mut(hash) else {
                continue;
            };
            if record.is_located() {
                debug!(hash, "content already resolved from another bucket");
                continue;
            }
            let Some(bucket) = entry.path().parent() else {
                continue;
            };

            record.locate(bucket);
            reports.extend(self.copy_record(record, state)?);

            for context_id in record.context_ids() {
                resolved.add(context_id, record.hash());
            }
        }

        let missing = catalog.records().filter(|r| !r.is_located()).count();
        if missing > 0 {
            warn!(missing, "catalogued files not found in blob store");
        }
        info!(
            files = catalog.len() - missing,
            contexts = resolved.context_count(),
            "file resolution complete"
        );

        Ok(resolved)
    }

    /// Copy a located record's blob to the content directory under each alias.
    ///
    /// An alias whose output path was already reserved this run is renamed by
    /// inserting the duplicate suffix before its extension until it is free;
    /// the record remembers the new name. Files already on disk are left alone.
    pub fn copy_record(
        &self,
        record: &mut FileRecord,
        state: &mut RunState,
    ) -> Result<Vec<FileReport>> {
        let blob = record.blob_path().ok_or_else(|| ResolveError::Unlocated {
            hash: record.hash().to_string(),
        })?;

        let originals: Vec<String> = record.original_names().map(str::to_string).collect();
        let mut reports = Vec::with_capacity(originals.len());

        for original in originals {
            let mut name = record
                .resolved_name(&original)
                .unwrap_or(&original)
                .to_string();
            let mut path = self.content_dir.join(&name);
            let mut renamed = false;

            while state.is_content_reserved(&path) {
                name = insert_suffix(&name, &self.suffix);
                path = self.content_dir.join(&name);
                renamed = true;
            }
            if renamed {
                debug!(original = %original, renamed = %name, "renamed colliding file");
                record.rename(&original, name.clone());
            }
            state.reserve_content(path.clone());

            let outcome = if path.exists() {
                Outcome::AlreadyExists
            } else {
                match fs::copy(&blob, &path) {
                    Ok(_) => Outcome::Success,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "failed to copy file");
                        Outcome::Failure
                    }
                }
            };
            debug!(name = %name, ?outcome, "resolved file");
            reports.push(FileReport { name, outcome });
        }

        Ok(reports)
    }
}

/// Insert `suffix` before the last `.` of `name`, or append it if there is none.
pub fn insert_suffix(name: &str, suffix: &str) -> String {
    match name.rfind('.') {
        Some(dot) => format!("{}{suffix}{}", &name[..dot], &name[dot..]),
        None => format!("{name}{suffix}"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use moodlesite_core::FileEntry;
    use tempfile::TempDir;

    use super::*;

    fn entry(hash: &str, name: &str, context: &str) -> FileEntry {
        FileEntry {
            content_hash: hash.to_string(),
            filename: name.to_string(),
            context_id: context.to_string(),
        }
    }

    fn blob_store(blobs: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (hash, data) in blobs {
            let bucket = dir.path().join(&hash[..2]);
            fs::create_dir_all(&bucket).unwrap();
            fs::write(bucket.join(hash), data).unwrap();
        }
        dir
    }

    #[test]
    fn test_insert_suffix() {
        assert_eq!(insert_suffix("a.txt", "_"), "a_.txt");
        assert_eq!(insert_suffix("a_.txt", "_"), "a__.txt");
        assert_eq!(insert_suffix("archive.tar.gz", "_"), "archive.tar_.gz");
        assert_eq!(insert_suffix("README", "_"), "README_");
    }

    #[test]
    fn test_copy_unlocated_is_error() {
        let out = TempDir::new().unwrap();
        let resolver = FileResolver::new(out.path(), "_");
        let mut record = FileRecord::new("abc", "a.txt", "1");
        let err = resolver
            .copy_record(&mut record, &mut RunState::new())
            .unwrap_err();
        assert!(matches!(err, ResolveError::Unlocated { .. }));
    }

    #[test]
    fn test_aliases_share_blob_and_context() {
        let blobs = blob_store(&[("aa11", "same bytes")]);
        let out = TempDir::new().unwrap();
        let mut catalog =
            FileCatalog::from_entries(&[entry("aa11", "a.txt", "5"), entry("aa11", "b.txt", "5")]);

        let resolver = FileResolver::new(out.path(), "_");
        let mut reports = Vec::new();
        let resolved = resolver
            .resolve(&mut catalog, blobs.path(), &mut RunState::new(), &mut reports)
            .unwrap();

        assert_eq!(fs::read(out.path().join("a.txt")).unwrap(), b"same bytes");
        assert_eq!(fs::read(out.path().join("b.txt")).unwrap(), b"same bytes");
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.outcome == Outcome::Success));

        let records = resolved.records(&catalog, "5");
        assert_eq!(records.len(), 1);
        assert!(records[0].has_name("a.txt"));
        assert!(records[0].has_name("b.txt"));
    }

    #[test]
    fn test_colliding_names_are_suffixed() {
        let blobs = blob_store(&[("aa11", "first"), ("bb22", "second")]);
        let out = TempDir::new().unwrap();
        let mut catalog = FileCatalog::from_entries(&[
            entry("aa11", "notes.txt", "1"),
            entry("bb22", "notes.txt", "2"),
        ]);

        let resolver = FileResolver::new(out.path(), "_");
        let resolved = resolver
            .resolve(&mut catalog, blobs.path(), &mut RunState::new(), &mut Vec::new())
            .unwrap();

        // Buckets are walked in name order, so aa11 claims the plain name.
        assert_eq!(fs::read(out.path().join("notes.txt")).unwrap(), b"first");
        assert_eq!(fs::read(out.path().join("notes_.txt")).unwrap(), b"second");

        let second = resolved.records(&catalog, "2")[0];
        assert_eq!(second.resolved_name("notes.txt"), Some("notes_.txt"));

        let outputs: HashSet<_> = catalog
            .records()
            .flat_map(|r| r.names().map(|(_, out)| out.to_string()).collect::<Vec<_>>())
            .collect();
        assert_eq!(outputs.len(), 2);
    }

    #[test]
    fn test_second_run_reports_existing() {
        let blobs = blob_store(&[("aa11", "data")]);
        let out = TempDir::new().unwrap();
        let entries = [entry("aa11", "a.txt", "1")];
        let resolver = FileResolver::new(out.path(), "_");

        for expected in [Outcome::Success, Outcome::AlreadyExists] {
            let mut catalog = FileCatalog::from_entries(&entries);
            let mut reports = Vec::new();
            resolver
                .resolve(&mut catalog, blobs.path(), &mut RunState::new(), &mut reports)
                .unwrap();
            assert_eq!(reports[0].outcome, expected);
        }
    }

    #[test]
    fn test_unknown_blobs_and_loose_files_ignored() {
        let blobs = blob_store(&[("zz99", "orphan")]);
        fs::write(blobs.path().join("loose"), b"x").unwrap();
        let out = TempDir::new().unwrap();
        let mut catalog = FileCatalog::from_entries(&[entry("aa11", "a.txt", "1")]);

        let resolved = FileResolver::new(out.path(), "_")
            .resolve(&mut catalog, blobs.path(), &mut RunState::new(), &mut Vec::new())
            .unwrap();

        assert_eq!(resolved.context_count(), 0);
        assert!(!catalog.get("aa11").unwrap().is_located());
    }

    #[test]
    fn test_missing_blob_store() {
        let out = TempDir::new().unwrap();
        let err = FileResolver::new(out.path(), "_")
            .resolve(
                &mut FileCatalog::new(),
                &out.path().join("files"),
                &mut RunState::new(),
                &mut Vec::new(),
            )
            .unwrap_err();
        assert!(matches!(err, ResolveError::MissingBlobStore(_)));
    }
}
