//! Workspace indexing command.

use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use koder_core::RemoteSync;
use koder_core::indexer::Indexer;
use std::path::Path;

use super::open_memory;
use crate::config::Config;

pub async fn execute(root: &Path, config: &Config) -> Result<()> {
    let memory = open_memory(config).await?;
    let indexer = Indexer::new(&memory);

    let scan = indexer
        .scan(root)
        .await
        .with_context(|| format!("Failed to scan {}", root.display()))?;

    let progress = ProgressBar::new(scan.files.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{spinner} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );
    let report = indexer
        .index(root, scan, |file| {
            progress.set_message(file.relative.clone());
            progress.inc(1);
        })
        .await?;
    progress.finish_and_clear();

    println!(
        "{} Indexed {} ({} files stored)",
        "✓".green(),
        report.root.display().to_string().cyan(),
        report.files_stored
    );
    if report.skipped_large > 0 {
        println!("  Skipped (too large): {}", report.skipped_large);
    }
    if report.skipped_binary > 0 {
        println!("  Skipped (not UTF-8): {}", report.skipped_binary);
    }
    if let RemoteSync::Pending { reason } = &report.workspace_sync {
        println!("  {} Workspace metadata not replicated: {}", "!".yellow(), reason);
    }
    if !report.errors.is_empty() {
        println!("  {} {} file(s) failed:", "✗".red(), report.errors.len());
        for error in &report.errors {
            println!("    {}: {}", error.path, error.message);
        }
    }
    Ok(())
}
