//! Watch command - regenerates on content changes

use std::{path::Path, sync::Arc, time::Duration};

use color_eyre::eyre::{Result, WrapErr};
use inklayer_core::GenerationMode;
use inklayer_generator::{GenerateError, Generator};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher, event::ModifyKind};
use tokio::sync::mpsc;

use super::{load_config, print_report};

/// Debounce interval for file changes.
const DEBOUNCE_MS: u64 = 200;

/// Run the watch command.
///
/// Generates once, then again after every batch of content changes until
/// Ctrl+C.
pub async fn run(config_path: &Path, mode: GenerationMode) -> Result<()> {
    tracing::info!(?config_path, %mode, "Starting watch mode");

    let config = load_config(config_path)?;
    let content_dir = config.content_dir.clone();
    let output_dir = config.output_dir.clone();
    let generator = Arc::new(Generator::new(config));

    regenerate(&generator, mode).await;

    let (tx, mut rx) = mpsc::channel::<()>(16);
    let mut watcher = RecommendedWatcher::new(
        move |res: Result<notify::Event, notify::Error>| {
            if let Ok(event) = res
                && is_content_change(&event.kind)
                && !event.paths.iter().all(|p| p.starts_with(&output_dir))
            {
                // A full channel already has a pending regeneration.
                let _ = tx.try_send(());
            }
        },
        notify::Config::default(),
    )
    .wrap_err("Failed to create file watcher")?;

    watcher
        .watch(&content_dir, RecursiveMode::Recursive)
        .wrap_err_with(|| format!("Failed to watch {}", content_dir.display()))?;
    tracing::debug!(dir = %content_dir.display(), "Watching content directory");

    println!("  Watching {} for changes", content_dir.display());
    println!("  Press Ctrl+C to stop");
    println!();

    loop {
        tokio::select! {
            event = rx.recv() => {
                if event.is_none() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(DEBOUNCE_MS)).await;
                while rx.try_recv().is_ok() {}

                println!("  File change detected, regenerating...");
                regenerate(&generator, mode).await;
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                println!("  Stopping");
                break;
            }
        }
    }

    drop(watcher);
    Ok(())
}

/// Run one generation on the blocking pool and print its report.
async fn regenerate(generator: &Arc<Generator>, mode: GenerationMode) {
    let generator = Arc::clone(generator);
    match tokio::task::spawn_blocking(move || generator.generate(mode)).await {
        Ok(Ok(report)) => print_report(&report),
        Ok(Err(GenerateError::AlreadyRunning)) => {
            tracing::debug!("Generation already running, skipping");
        }
        Ok(Err(e)) => {
            tracing::error!("Generation failed: {e}");
            eprintln!("  ✗ Generation failed: {e}");
        }
        Err(e) => {
            tracing::error!("Generation task panicked: {e}");
        }
    }
}

/// Events that can change the set or contents of source files.
fn is_content_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Name(_))
            | EventKind::Create(_)
            | EventKind::Remove(_)
    )
}
