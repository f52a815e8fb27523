//! Workspace metadata and path index maintenance.

use anyhow::{Context, Result};
use colored::Colorize;

use super::open_memory;
use crate::config::Config;

/// Show the recorded workspace metadata.
pub async fn show(config: &Config) -> Result<()> {
    let memory = open_memory(config).await?;
    match memory.load_workspace_metadata().await? {
        Some(meta) => {
            println!("{}", "Workspace".cyan().bold());
            println!("  Path:         {}", meta.path);
            println!("  Last indexed: {}", meta.last_indexed);
            println!("  Files:        {}", meta.file_count);
        }
        None => println!(
            "{}",
            "No workspace metadata recorded. Run 'koder index' first.".yellow()
        ),
    }
    Ok(())
}

/// Rebuild the local path index from the metadata catalog.
pub async fn rebuild(config: &Config) -> Result<()> {
    let memory = open_memory(config).await?;
    let count = memory
        .rebuild_path_index()
        .await
        .context("Failed to rebuild path index")?;
    println!("{} Rebuilt path index ({} paths)", "✓".green(), count);
    Ok(())
}
