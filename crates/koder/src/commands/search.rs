//! Code search command.

use anyhow::{Context, Result};
use colored::Colorize;

use super::open_memory;
use crate::config::Config;

pub async fn execute(query: &str, limit: usize, json: bool, config: &Config) -> Result<()> {
    let memory = open_memory(config).await?;
    let mut matches = memory
        .search(query)
        .await
        .with_context(|| format!("Search for '{}' failed", query))?;
    matches.truncate(limit);

    if json {
        println!("{}", serde_json::to_string_pretty(&matches)?);
        return Ok(());
    }

    if matches.is_empty() {
        println!("{}", "No matches found.".yellow());
        return Ok(());
    }

    println!("{}", format!("Matches for '{}'", query).cyan().bold());
    println!("{}", "─".repeat(50));
    for m in &matches {
        println!("  {} {}", format!("[{:>4.0}]", m.score).dimmed(), m.path.bold());
        if let Some(snippet) = &m.snippet {
            println!("         {}", snippet);
        }
    }
    println!();
    println!("{} result(s)", matches.len());
    Ok(())
}
