//! CLI commands.

pub mod check;
pub mod clean;
pub mod generate;
pub mod watch;

use std::path::Path;

use color_eyre::eyre::{Result, WrapErr};
use inklayer_core::Config;
use inklayer_generator::GenerationReport;

/// Load configuration with `INKLAYER__*` environment overrides.
pub fn load_config(config_path: &Path) -> Result<Config> {
    let config = Config::load_with_env(config_path)
        .wrap_err_with(|| format!("Failed to load configuration from {}", config_path.display()))?;
    tracing::debug!(?config, "Loaded configuration");
    Ok(config)
}

/// Print per-collection counts and every failure.
pub fn print_report(report: &GenerationReport) {
    println!();
    println!("  {:<16} {:>7} {:>9} {:>7} {:>7}", "Collection", "Cached", "Compiled", "Failed", "Total");
    println!("  ──────────────────────────────────────────────────");
    for (doc_type, counts) in &report.per_type {
        println!(
            "  {doc_type:<16} {:>7} {:>9} {:>7} {:>7}",
            counts.cached, counts.compiled, counts.failed, counts.total
        );
    }
    println!("  ──────────────────────────────────────────────────");
    println!("  Duration:        {:>6}ms", report.elapsed_ms);

    if !report.failures.is_empty() {
        println!();
        println!("  Errors:");
        for failure in &report.failures {
            println!("  ✗ {failure}");
        }
    }
    for duplicates in &report.duplicates {
        println!();
        println!("  {duplicates}");
    }
    println!();
}
