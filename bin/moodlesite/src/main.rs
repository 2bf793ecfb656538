//! moodlesite CLI
//!
//! Turns an extracted Moodle course backup into a browsable static site.
//!
//! This is the binary entry point. The library functionality is in `lib.rs`.

use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::Result;

/// Command-line interface for moodlesite.
#[derive(Parser)]
#[command(
    name = "moodlesite",
    version,
    about = "Convert an extracted Moodle backup into a static site"
)]
struct Cli {
    /// Path to configuration file (defaults are used when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(clap::Subcommand)]
enum Commands {
    /// Copy course files and write one page per activity, then the index
    Build {
        /// Extracted backup directory
        source: PathBuf,
        /// Output directory (defaults to the backup directory)
        dest: Option<PathBuf>,
    },
    /// Regenerate only the index page of an existing output directory
    Index {
        /// Output directory holding the html pages
        dest: PathBuf,
        /// Extracted backup directory to read the course name from
        #[arg(short, long)]
        source: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    moodlesite::init_tracing(cli.verbose);

    match cli.command {
        Commands::Build { source, dest } => {
            let dest = dest.unwrap_or_else(|| source.clone());
            moodlesite::cmd::build::run(cli.config.as_deref(), &source, &dest)?;
        }
        Commands::Index { dest, source } => {
            moodlesite::cmd::index::run(cli.config.as_deref(), &dest, source.as_deref())?;
        }
    }

    Ok(())
}
