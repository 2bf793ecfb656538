//! Course activity types.

use std::fmt;

/// Type tag of a course activity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    /// Assignment (`assign`).
    Assignment,
    /// Plain page (`page`).
    Page,
    /// External link (`url`).
    Url,
    /// Single file resource (`resource`).
    Resource,
    /// Folder of files (`folder`).
    Folder,
    /// Quiz (`quiz`).
    Quiz,
    /// Any other module, carrying its tag.
    Unsupported(String),
}

impl ActivityKind {
    /// Every supported kind.
    pub const SUPPORTED: [ActivityKind; 6] = [
        Self::Assignment,
        Self::Page,
        Self::Url,
        Self::Resource,
        Self::Folder,
        Self::Quiz,
    ];

    /// Determine the kind from a Moodle module name.
    pub fn from_module_name(name: &str) -> Self {
        match name {
            "assign" => Self::Assignment,
            "page" => Self::Page,
            "url" => Self::Url,
            "resource" => Self::Resource,
            "folder" => Self::Folder,
            "quiz" => Self::Quiz,
            other => Self::Unsupported(other.to_string()),
        }
    }

    /// Parse a supported module tag, `None` for anything else.
    pub fn supported(tag: &str) -> Option<Self> {
        match Self::from_module_name(tag) {
            Self::Unsupported(_) => None,
            kind => Some(kind),
        }
    }

    /// The literal module tag used in filenames.
    pub fn tag(&self) -> &str {
        match self {
            Self::Assignment => "assign",
            Self::Page => "page",
            Self::Url => "url",
            Self::Resource => "resource",
            Self::Folder => "folder",
            Self::Quiz => "quiz",
            Self::Unsupported(tag) => tag,
        }
    }

    /// Group heading used on the index page.
    pub fn label(&self) -> &str {
        match self {
            Self::Assignment => "Assignments",
            Self::Page => "Pages",
            Self::Url => "Links",
            Self::Resource => "Resources",
            Self::Folder => "Folders",
            Self::Quiz => "Quizzes",
            Self::Unsupported(tag) => tag,
        }
    }

    /// Whether pages are generated for this kind.
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported(_))
    }

    /// Placeholder body for activities without text: the capitalized tag.
    pub fn placeholder(&self) -> String {
        let tag = self.tag();
        let mut chars = tag.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}
