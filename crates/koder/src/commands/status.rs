//! Status command: cache and remote health.

use anyhow::Result;
use colored::Colorize;
use koder_core::remote::{HttpRemote, SqliteRemote};

use super::{RemoteKind, open_memory};
use crate::config::Config;

pub async fn execute(config: &Config) -> Result<()> {
    println!("{}", "koder status".cyan().bold());
    println!("{}", "─".repeat(50));
    println!();

    print!("  Config file: ");
    let config_path = Config::config_path();
    if config_path.exists() {
        println!("{} {}", "✓".green(), config_path.display());
    } else {
        println!("{}", "○ not found (using defaults)".yellow());
    }

    let memory = open_memory(config).await?;
    println!("  Cache: {}", memory.cache_dir().display());
    println!("  Path mappings: {}", memory.path_index().len().await);
    match memory.load_workspace_metadata().await? {
        Some(meta) => println!(
            "  Workspace: {} ({} files, indexed {})",
            meta.path, meta.file_count, meta.last_indexed
        ),
        None => println!("  Workspace: {}", "not indexed".yellow()),
    }

    print!("  Remote: ");
    match RemoteKind::select(&config.remote) {
        RemoteKind::Http => {
            let url = config.remote.url.as_deref().unwrap_or_default();
            match HttpRemote::new(&config.remote) {
                Ok(remote) => match remote.health().await {
                    Ok(()) => println!("{} {}", "✓ reachable".green(), url),
                    Err(e) => println!("{} {} ({})", "✗ unreachable".red(), url, e),
                },
                Err(e) => println!("{} {}", "✗".red(), e),
            }
        }
        RemoteKind::Sqlite => {
            if let Some(path) = &config.remote.database {
                match SqliteRemote::open(path).and_then(|db| db.ping()) {
                    Ok(()) => println!("{} {}", "✓ sqlite".green(), path.display()),
                    Err(e) => println!("{} {} ({})", "✗ sqlite".red(), path.display(), e),
                }
            }
        }
        RemoteKind::Local => println!("{}", "○ none (process-local only)".yellow()),
    }

    Ok(())
}
