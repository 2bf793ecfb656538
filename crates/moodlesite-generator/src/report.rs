//! Per-item outcomes of a run.

use std::fmt;

use moodlesite_core::ActivityKind;

/// Result of processing one file alias or one activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// The output was written.
    Success,
    /// The output was already present; nothing was written.
    AlreadyExists,
    /// The activity type has no page renderer.
    Unsupported,
    /// Processing failed; the run continued.
    Failure,
}

/// Outcome for one alias of a resolved file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    /// Output name of the alias.
    pub name: String,
    pub outcome: Outcome,
}

impl fmt::Display for FileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.outcome {
            Outcome::Success => write!(f, "Copied file {}", self.name),
            Outcome::AlreadyExists => {
                write!(f, "Did not copy file {}, already exists", self.name)
            }
            Outcome::Unsupported | Outcome::Failure => {
                write!(f, "Failed to copy file {}", self.name)
            }
        }
    }
}

/// Outcome for one activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityReport {
    pub kind: ActivityKind,
    pub name: String,
    pub outcome: Outcome,
}

impl fmt::Display for ActivityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (kind, name) = (&self.kind, &self.name);
        match self.outcome {
            Outcome::Success => write!(f, "Processed {kind} {name}"),
            Outcome::AlreadyExists => write!(f, "Did not process {kind} {name}, already exists"),
            Outcome::Unsupported => {
                write!(f, "Did not process {kind} {name}, type not supported")
            }
            Outcome::Failure => write!(f, "Failed to process {kind} {name}"),
        }
    }
}

/// Everything a run did, in processing order.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub files: Vec<FileReport>,
    pub activities: Vec<ActivityReport>,
    /// Whether the index page was (re)written.
    pub index_written: bool,
    /// Build duration in milliseconds.
    pub duration_ms: u64,
}

impl BuildReport {
    /// Number of activities with the given outcome.
    pub fn activity_count(&self, outcome: Outcome) -> usize {
        self.activities
            .iter()
            .filter(|a| a.outcome == outcome)
            .count()
    }

    /// Number of file aliases with the given outcome.
    pub fn file_count(&self, outcome: Outcome) -> usize {
        self.files.iter().filter(|f| f.outcome == outcome).count()
    }
}
