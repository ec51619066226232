//! Clean command - removes the change-detection cache

use std::{fs, path::Path};

use color_eyre::eyre::{Result, WrapErr};
use inklayer_generator::cache::cache_dir;

use super::load_config;

/// Run the clean command.
pub fn run(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let dir = cache_dir(&config.output_dir);

    if dir.exists() {
        fs::remove_dir_all(&dir)
            .wrap_err_with(|| format!("Failed to remove {}", dir.display()))?;
        tracing::info!(dir = %dir.display(), "Removed cache");
        println!("  ✓ Removed {}", dir.display());
    } else {
        println!("  Nothing to clean");
    }
    Ok(())
}
