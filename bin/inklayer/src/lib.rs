//! inklayer CLI Library
//!
//! Command implementations for the `inklayer` binary, exposed as a library so
//! they can be driven from integration tests.
//!
//! # Modules
//!
//! - [`cmd`] - Command implementations (generate, check, watch, clean)
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use inklayer::{GenerationMode, cmd};
//!
//! cmd::generate::run(Path::new("inklayer.toml"), GenerationMode::Production, false).unwrap();
//! ```

pub mod cmd;

pub use inklayer_core::{Config, GenerationMode};
pub use inklayer_generator::{GenerationReport, Generator};

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
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();
}
