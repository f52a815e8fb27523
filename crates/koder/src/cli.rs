//! CLI argument definitions using clap derive macros.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Koder workspace memory CLI
///
/// Content-addressed storage of workspace files and task records, cached
/// locally and replicated to a remote store.
#[derive(Parser, Debug)]
#[command(name = "koder")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags that override the config file and environment
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// Local cache directory
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// koder-server base URL
    #[arg(long, global = true)]
    pub remote_url: Option<String>,

    /// SQLite remote store (used when no URL is set)
    #[arg(long, global = true)]
    pub remote_db: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Store a file under its workspace path
    Store(StoreArgs),

    /// Print a stored file by path
    Get(GetArgs),

    /// Drop the local path mapping for a file
    Forget {
        /// Workspace-relative path
        path: String,
    },

    /// Search stored code
    Search {
        /// Text to search for
        query: String,

        /// Maximum results
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Index every text file under a workspace root
    Index {
        /// Workspace root
        #[arg(default_value = ".")]
        root: PathBuf,
    },

    /// Show the recorded workspace metadata
    Workspace,

    /// Rebuild the local path index from the metadata catalog
    Rebuild,

    /// Task ledger (new, say, complete, sync, show, list)
    Task(TaskCommand),

    /// Show cache and remote status
    Status,

    /// Show version
    Version,
}

// ─────────────────────────────────────────────────────────────────────────────
// File Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct StoreArgs {
    /// Workspace-relative path to store the content under
    pub path: String,

    /// Read content from this file instead of `path`
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// File type (defaults to the path's extension)
    #[arg(short = 't', long)]
    pub file_type: Option<String>,

    /// Modification timestamp (defaults to the source file's mtime)
    #[arg(short, long)]
    pub modified: Option<String>,

    /// Expected content hash; the store fails if the content differs
    #[arg(long)]
    pub hash: Option<String>,
}

#[derive(Args, Debug)]
pub struct GetArgs {
    /// Workspace-relative path
    pub path: String,

    /// Write content to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Task Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct TaskCommand {
    #[command(subcommand)]
    pub action: TaskAction,
}

#[derive(Subcommand, Debug)]
pub enum TaskAction {
    /// Start a task
    New {
        /// Initial prompt; sets the title
        prompt: Option<String>,
    },

    /// Append a message to a task
    Say {
        /// Task ID
        id: String,

        /// Message text
        message: String,

        /// Message role
        #[arg(short, long, default_value = "user", value_parser = ["user", "assistant", "system"])]
        role: String,
    },

    /// Mark a task complete
    Complete {
        /// Task ID
        id: String,
    },

    /// Re-push a task's local record to the remote tier
    Sync {
        /// Task ID
        id: String,
    },

    /// Show a task and its messages
    Show {
        /// Task ID
        id: String,
    },

    /// List recorded tasks
    List,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "koder",
            "get",
            "src/a.ts",
            "--cache-dir",
            "/tmp/cache",
        ])
        .unwrap();
        assert_eq!(cli.global.cache_dir, Some(PathBuf::from("/tmp/cache")));
        assert!(matches!(cli.command, Commands::Get(GetArgs { ref path, .. }) if path == "src/a.ts"));
    }

    #[test]
    fn test_task_role_is_restricted() {
        assert!(Cli::try_parse_from(["koder", "task", "say", "t1", "hi", "--role", "robot"]).is_err());
        assert!(Cli::try_parse_from(["koder", "task", "say", "t1", "hi", "--role", "assistant"]).is_ok());
    }

    #[test]
    fn test_task_sync_takes_id() {
        let cli = Cli::try_parse_from(["koder", "task", "sync", "t1"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Task(TaskCommand { action: TaskAction::Sync { ref id } }) if id == "t1"
        ));
    }
}
