//! Build command - converts a backup into a static site

use std::path::Path;

use color_eyre::eyre::{Result, WrapErr};
use moodlesite_generator::{BuildReport, Builder, Outcome};

use super::load_config;

/// Run the build command.
///
/// Prints one status line per copied file and per activity, then a summary.
pub fn run(config_path: Option<&Path>, source: &Path, dest: &Path) -> Result<()> {
    tracing::info!(?config_path, ?source, ?dest, "Starting build");

    let config = load_config(config_path)?;
    let builder = Builder::new(config, source, dest);
    let report = builder.build().wrap_err("Build failed")?;

    for line in status_lines(&report) {
        println!("{line}");
    }
    print_summary(&report, &builder);

    tracing::info!(duration_ms = report.duration_ms, "Build completed");
    Ok(())
}

/// Status lines in processing order: files first, then activities.
pub fn status_lines(report: &BuildReport) -> Vec<String> {
    report
        .files
        .iter()
        .map(ToString::to_string)
        .chain(report.activities.iter().map(ToString::to_string))
        .collect()
}

fn print_summary(report: &BuildReport, builder: &Builder) {
    println!();
    println!("  Build finished");
    println!();
    println!(
        "  Files:      {} copied, {} already present",
        report.file_count(Outcome::Success),
        report.file_count(Outcome::AlreadyExists)
    );
    println!(
        "  Pages:      {} written, {} already present",
        report.activity_count(Outcome::Success),
        report.activity_count(Outcome::AlreadyExists)
    );
    println!(
        "  Skipped:    {} unsupported, {} failed",
        report.activity_count(Outcome::Unsupported),
        report.activity_count(Outcome::Failure)
    );
    println!(
        "  Index:      {}",
        if report.index_written { "written" } else { "unchanged" }
    );
    println!();
    println!("  Duration:   {:.2}s", report.duration_ms as f64 / 1000.0);
    println!("  Output:     {}", builder.html_dir().display());
    println!();
}

#[cfg(test)]
mod tests {
    use moodlesite_core::ActivityKind;
    use moodlesite_generator::{ActivityReport, FileReport};

    use super::*;

    #[test]
    fn test_status_lines_order() {
        let report = BuildReport {
            files: vec![FileReport {
                name: "a.txt".to_string(),
                outcome: Outcome::Success,
            }],
            activities: vec![ActivityReport {
                kind: ActivityKind::Unsupported("forum".to_string()),
                name: "News".to_string(),
                outcome: Outcome::Unsupported,
            }],
            ..Default::default()
        };

        assert_eq!(
            status_lines(&report),
            [
                "Copied file a.txt",
                "Did not process forum News, type not supported"
            ]
        );
    }
}
