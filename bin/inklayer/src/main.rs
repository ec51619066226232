//! inklayer CLI
//!
//! Incremental, schema-validated content compiler.
//!
//! This is the binary entry point. The library functionality is in `lib.rs`.

use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::Result;
use inklayer::GenerationMode;

/// Command-line interface for inklayer.
#[derive(Parser)]
#[command(
    name = "inklayer",
    version,
    about = "Compile content collections into validated JSON documents"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = inklayer_core::config::CONFIG_FILE)]
    config: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(clap::Subcommand)]
enum Commands {
    /// Generate documents for every collection
    Generate {
        /// Generation mode (development or production)
        #[arg(short, long, default_value = "development")]
        mode: GenerationMode,
        /// Ignore the change-detection cache
        #[arg(long)]
        no_cache: bool,
    },
    /// Compile everything without writing artifacts
    Check,
    /// Regenerate whenever content changes
    Watch {
        /// Generation mode (development or production)
        #[arg(short, long, default_value = "development")]
        mode: GenerationMode,
    },
    /// Remove the change-detection cache
    Clean,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    inklayer::init_tracing(cli.verbose);

    match cli.command {
        Commands::Generate { mode, no_cache } => {
            inklayer::cmd::generate::run(&cli.config, mode, no_cache)?;
        }
        Commands::Check => {
            inklayer::cmd::check::run(&cli.config)?;
        }
        Commands::Watch { mode } => {
            inklayer::cmd::watch::run(&cli.config, mode).await?;
        }
        Commands::Clean => {
            inklayer::cmd::clean::run(&cli.config)?;
        }
    }

    Ok(())
}
