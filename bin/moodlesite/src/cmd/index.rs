//! Index command - regenerates the index page only

use std::path::Path;

use color_eyre::eyre::{Result, WrapErr, bail};
use moodlesite_generator::Builder;

use super::load_config;

/// Run the index command.
///
/// `source` is only read for the course name; without it the configured
/// fallback title is used.
pub fn run(config_path: Option<&Path>, dest: &Path, source: Option<&Path>) -> Result<()> {
    tracing::info!(?config_path, ?dest, ?source, "Regenerating index");

    let config = load_config(config_path)?;
    let builder = Builder::new(config, source.unwrap_or(dest), dest);

    let html_dir = builder.html_dir();
    if !html_dir.is_dir() {
        bail!("No html directory at {}", html_dir.display());
    }

    let written = builder.reindex().wrap_err("Index generation failed")?;
    if written {
        println!("Wrote {}", html_dir.join("index.html").display());
    } else {
        println!("Index unchanged");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_missing_html_dir() {
        let dir = TempDir::new().unwrap();
        assert!(run(None, dir.path(), None).is_err());
    }

    #[test]
    fn test_writes_index() {
        let dir = TempDir::new().unwrap();
        let html = dir.path().join("html");
        fs::create_dir_all(&html).unwrap();
        fs::write(
            html.join("page_Intro.html"),
            "<html>\n<head><title>Intro</title></head>\n<body></body>\n</html>",
        )
        .unwrap();

        run(None, dir.path(), None).unwrap();

        let index = fs::read_to_string(html.join("index.html")).unwrap();
        assert!(index.contains("<a href=\"page_Intro.html\">Intro</a>"));
    }
}
