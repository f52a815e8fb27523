//! File commands: store, get, forget.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use colored::Colorize;
use koder_core::{ContentHash, FileInfo};
use std::io::Write;
use std::path::Path;

use super::open_memory;
use crate::cli::{GetArgs, StoreArgs};
use crate::config::Config;

/// Store a file under its workspace path.
pub async fn store(args: StoreArgs, config: &Config) -> Result<()> {
    let source = args.file.as_deref().unwrap_or_else(|| Path::new(&args.path));
    let content = std::fs::read(source)
        .with_context(|| format!("Failed to read {}", source.display()))?;

    let file_type = args
        .file_type
        .unwrap_or_else(|| extension_of(&args.path).to_string());
    let modified = match args.modified {
        Some(modified) => modified,
        None => mtime_of(source)?,
    };

    let mut info = FileInfo::new(&args.path, content, file_type, modified);
    if let Some(hash) = &args.hash {
        info = info.with_hash(ContentHash::parse(hash)?);
    }

    let memory = open_memory(config).await?;
    let hash = memory
        .store_file(&info)
        .await
        .with_context(|| format!("Failed to store {}", args.path))?;

    println!("{} Stored {}", "✓".green(), args.path.cyan());
    println!("  Hash: {}", hash);
    println!("  Size: {} bytes", info.content.len());
    Ok(())
}

/// Print or write a stored file.
pub async fn get(args: GetArgs, config: &Config) -> Result<()> {
    let memory = open_memory(config).await?;
    let Some(content) = memory.get_file(&args.path).await? else {
        bail!("{} is not in memory", args.path);
    };

    match args.output {
        Some(output) => {
            std::fs::write(&output, &content)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!(
                "{} Wrote {} ({} bytes)",
                "✓".green(),
                output.display(),
                content.len()
            );
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&content)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

/// Drop the local mapping for a path.
pub async fn forget(path: &str, config: &Config) -> Result<()> {
    let memory = open_memory(config).await?;
    match memory.forget_path(path).await? {
        Some(hash) => println!("{} Forgot {} (content {} kept)", "✓".green(), path.cyan(), hash),
        None => println!("{} {} has no local mapping", "○".yellow(), path),
    }
    Ok(())
}

fn extension_of(path: &str) -> &str {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
}

fn mtime_of(path: &Path) -> Result<String> {
    let modified = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .with_context(|| format!("Failed to read modification time of {}", path.display()))?;
    Ok(DateTime::<Utc>::from(modified).to_rfc3339())
}
