//! Check command - compile everything without writing

use std::path::Path;

use color_eyre::eyre::{Result, WrapErr, bail};
use inklayer_generator::{GenerateOptions, Generator};

use super::{load_config, print_report};

/// Run the check command.
///
/// Validates the configuration and compiles every file in development mode
/// without touching the cache or the generated artifacts.
pub fn run(config_path: &Path) -> Result<()> {
    tracing::info!(?config_path, "Checking configuration and content");

    println!("Checking configuration...");
    let config = load_config(config_path)?;
    println!("  ✓ Configuration valid ({} definitions)", config.definitions.len());

    println!("\nChecking content files...");
    let report = Generator::new(config)
        .generate_with(GenerateOptions::check())
        .wrap_err("Check failed")?;
    print_report(&report);

    if !report.is_success() {
        bail!("Validation failed with {} error(s)", report.failures.len());
    }

    println!("✓ All checks passed");
    Ok(())
}
