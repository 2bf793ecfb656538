//! Run configuration management.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Main configuration structure for moodlesite.
///
/// Every field has a default, so an empty file (or no file at all) is a valid
/// configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Site-wide settings.
    #[serde(default)]
    pub site: SiteConfig,

    /// Names of the directories and manifests inside the backup and output.
    #[serde(default)]
    pub layout: LayoutConfig,

    /// Output naming settings.
    #[serde(default)]
    pub naming: NamingConfig,

    /// Page rendering settings.
    #[serde(default)]
    pub render: RenderConfig,
}

/// Site-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Index title used when the backup does not declare a course name.
    #[serde(default = "default_fallback_title")]
    pub fallback_title: String,
}

/// Directory and manifest names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Output subdirectory holding the resolved files.
    #[serde(default = "default_content_dir")]
    pub content_dir: String,

    /// Output subdirectory holding the generated pages.
    #[serde(default = "default_html_dir")]
    pub html_dir: String,

    /// Backup subdirectory holding the hash-bucketed blob store.
    #[serde(default = "default_blob_dir")]
    pub blob_dir: String,

    /// File manifest inside the backup.
    #[serde(default = "default_files_manifest")]
    pub files_manifest: String,

    /// Backup manifest inside the backup.
    #[serde(default = "default_backup_manifest")]
    pub backup_manifest: String,

    /// Question bank inside the backup.
    #[serde(default = "default_questions_manifest")]
    pub questions_manifest: String,

    /// Whether to link the content directory into the html directory.
    #[serde(default = "default_true")]
    pub link_content: bool,
}

/// Output naming configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamingConfig {
    /// Text inserted to disambiguate colliding names.
    #[serde(default = "default_duplicate_suffix")]
    pub duplicate_suffix: String,

    /// Whether activity names are sanitized before use as filenames.
    #[serde(default = "default_true")]
    pub sanitize: bool,
}

/// Page rendering configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Whether to inject math scripts into pages that look like they contain LaTeX.
    #[serde(default = "default_true")]
    pub math: bool,

    /// Script URLs injected when math is detected.
    #[serde(default = "default_math_scripts")]
    pub math_scripts: Vec<String>,
}

// Default value functions
fn default_fallback_title() -> String {
    "Course Index".to_string()
}

fn default_content_dir() -> String {
    "content".to_string()
}

fn default_html_dir() -> String {
    "html".to_string()
}

fn default_blob_dir() -> String {
    "files".to_string()
}

fn default_files_manifest() -> String {
    "files.xml".to_string()
}

fn default_backup_manifest() -> String {
    "moodle_backup.xml".to_string()
}

fn default_questions_manifest() -> String {
    "questions.xml".to_string()
}

fn default_duplicate_suffix() -> String {
    "_".to_string()
}

fn default_math_scripts() -> Vec<String> {
    vec!["https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js".to_string()]
}

fn default_true() -> bool {
    true
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            fallback_title: default_fallback_title(),
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            content_dir: default_content_dir(),
            html_dir: default_html_dir(),
            blob_dir: default_blob_dir(),
            files_manifest: default_files_manifest(),
            backup_manifest: default_backup_manifest(),
            questions_manifest: default_questions_manifest(),
            link_content: true,
        }
    }
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            duplicate_suffix: default_duplicate_suffix(),
            sanitize: true,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            math: true,
            math_scripts: default_math_scripts(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CoreError::config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            CoreError::config_with_source(
                format!("Failed to parse config file: {}", path.display()),
                e,
            )
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration layered with `MOODLESITE__SECTION__KEY` environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix("MOODLESITE").separator("__"))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        // The collision loop only terminates if every retry changes the name.
        if self.naming.duplicate_suffix.is_empty() {
            return Err(CoreError::config("naming.duplicate_suffix cannot be empty"));
        }

        let dirs = [
            ("layout.content_dir", &self.layout.content_dir),
            ("layout.html_dir", &self.layout.html_dir),
            ("layout.blob_dir", &self.layout.blob_dir),
        ];
        for (field, value) in dirs {
            if value.is_empty() {
                return Err(CoreError::config(format!("{field} cannot be empty")));
            }
            if value.contains(&['/', '\\'][..]) {
                return Err(CoreError::config(format!(
                    "{field} must be a single directory name, got {value:?}"
                )));
            }
        }

        if self.render.math && self.render.math_scripts.is_empty() {
            tracing::warn!("render.math is enabled but no math_scripts are configured");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn create_test_config() -> String {
        r#"
[site]
fallback_title = "Archived Course"

[layout]
content_dir = "files-out"
html_dir = "pages"
link_content = false

[naming]
duplicate_suffix = "-dup"
sanitize = false

[render]
math = false
"#
        .to_string()
    }

    #[test]
    fn test_load_config() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config_path = dir.path().join("moodlesite.toml");
        let mut file = std::fs::File::create(&config_path).expect("create file");
        file.write_all(create_test_config().as_bytes())
            .expect("write");

        let config = Config::load(&config_path).expect("load config");

        assert_eq!(config.site.fallback_title, "Archived Course");
        assert_eq!(config.layout.content_dir, "files-out");
        assert_eq!(config.layout.html_dir, "pages");
        assert_eq!(config.layout.blob_dir, "files");
        assert!(!config.layout.link_content);
        assert_eq!(config.naming.duplicate_suffix, "-dup");
        assert!(!config.naming.sanitize);
        assert!(!config.render.math);
    }

    #[test]
    fn test_config_defaults() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config_path = dir.path().join("moodlesite.toml");
        std::fs::write(&config_path, "").expect("write");

        let config = Config::load(&config_path).expect("load config");

        assert_eq!(config.site.fallback_title, "Course Index");
        assert_eq!(config.layout.content_dir, "content");
        assert_eq!(config.layout.html_dir, "html");
        assert_eq!(config.layout.files_manifest, "files.xml");
        assert_eq!(config.layout.backup_manifest, "moodle_backup.xml");
        assert_eq!(config.naming.duplicate_suffix, "_");
        assert!(config.naming.sanitize);
        assert!(config.render.math);
        assert_eq!(config.render.math_scripts.len(), 1);
    }

    #[test]
    fn test_config_validation_empty_suffix() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config_path = dir.path().join("moodlesite.toml");
        std::fs::write(&config_path, "[naming]\nduplicate_suffix = \"\"\n").expect("write");

        let result = Config::load(&config_path);
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("duplicate_suffix cannot be empty")
        );
    }

    #[test]
    fn test_config_validation_nested_dir() {
        let mut config = Config::default();
        config.layout.html_dir = "out/html".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_not_found() {
        let result = Config::load(Path::new("/nonexistent/moodlesite.toml"));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("not found"));
    }
}
