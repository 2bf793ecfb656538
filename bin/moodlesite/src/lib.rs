//! moodlesite CLI Library
//!
//! Command implementations and logging setup for the `moodlesite` binary.
//!
//! # Modules
//!
//! - [`cmd`] - Command implementations (build, index)
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use moodlesite::cmd;
//!
//! // Convert a backup extracted into ./backup, writing the site next to it
//! cmd::build::run(None, Path::new("backup"), Path::new("backup")).unwrap();
//! ```

pub mod cmd;

pub use moodlesite_core::Config;
pub use moodlesite_generator::{BuildReport, Builder};

/// Initialize tracing with the specified verbosity level.
///
/// # Arguments
///
/// * `verbose` - Verbosity level (0 = WARN, 1 = INFO, 2 = DEBUG, 3+ = TRACE)
pub fn init_tracing(verbose: u8) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();
}
