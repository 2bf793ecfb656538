//! moodlesite Core Library
//!
//! Core types, configuration, and error handling for turning an extracted Moodle
//! course backup into a static site.

pub mod activity;
pub mod backup;
pub mod config;
pub mod error;
pub mod question;
pub mod xml;

pub use activity::ActivityKind;
pub use backup::{ActivityDocument, ActivityEntry, BackupManifest, FileEntry};
pub use config::Config;
pub use error::{CoreError, Result};
pub use question::{Answer, Question, QuestionBank, QuestionInstance, QuestionKind, QuestionRef};
pub use xml::Element;
