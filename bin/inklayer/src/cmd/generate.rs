//! Generate command - compiles every collection and writes artifacts

use std::path::Path;

use color_eyre::eyre::{Result, WrapErr, bail};
use inklayer_core::GenerationMode;
use inklayer_generator::{GenerateOptions, Generator, output::GENERATED_DIR};

use super::{load_config, print_report};

/// Run the generate command.
pub fn run(config_path: &Path, mode: GenerationMode, no_cache: bool) -> Result<()> {
    tracing::info!(?config_path, %mode, no_cache, "Starting generation");

    let config = load_config(config_path)?;
    let output = config.output_dir.clone();
    let generator = Generator::new(config);

    let report = generator
        .generate_with(GenerateOptions {
            mode,
            write: true,
            use_cache: !no_cache,
        })
        .wrap_err("Generation failed")?;
    print_report(&report);

    if !report.is_success() {
        bail!("{} file(s) failed", report.failures.len());
    }

    println!("  Output:   {}", output.join(GENERATED_DIR).display());
    println!();
    Ok(())
}
