//! koder - workspace memory CLI
//!
//! Stores workspace files and task records in the hybrid memory layer and
//! reads them back, with a local cache in front of an optional remote tier.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod cli;
mod commands;
mod config;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("koder=info".parse()?))
        .init();

    let cli = Cli::parse();

    // Load configuration, then apply global flags
    let mut config = config::Config::load()?;
    config.apply_overrides(&cli.global);

    // Execute command
    match cli.command {
        Commands::Store(cmd) => commands::files::store(cmd, &config).await,
        Commands::Get(cmd) => commands::files::get(cmd, &config).await,
        Commands::Forget { path } => commands::files::forget(&path, &config).await,
        Commands::Search { query, limit, json } => {
            commands::search::execute(&query, limit, json, &config).await
        }
        Commands::Index { root } => commands::index::execute(&root, &config).await,
        Commands::Workspace => commands::workspace::show(&config).await,
        Commands::Rebuild => commands::workspace::rebuild(&config).await,
        Commands::Task(cmd) => commands::task::execute(cmd, &config).await,
        Commands::Status => commands::status::execute(&config).await,
        Commands::Version => {
            println!("koder {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
