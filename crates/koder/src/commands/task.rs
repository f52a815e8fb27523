//! Task ledger commands.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Local, TimeZone, Utc};
use colored::Colorize;
use koder_core::Task;
use koder_core::types::{Role, TaskMetadata};

use super::open_memory;
use crate::cli::{TaskAction, TaskCommand};
use crate::config::Config;

/// Execute task command.
pub async fn execute(cmd: TaskCommand, config: &Config) -> Result<()> {
    let memory = open_memory(config).await?;

    match cmd.action {
        TaskAction::New { prompt } => {
            let task = Task::new(memory, prompt.as_deref())
                .await
                .context("Failed to create task")?;
            println!("{} Task created: {}", "✓".green(), task.title().cyan());
            println!("  ID: {}", task.id());
        }

        TaskAction::Say { id, message, role } => {
            let mut task = resume(memory, &id).await?;
            task.add_message(parse_role(&role), message)
                .await
                .with_context(|| format!("Failed to record message on task {}", id))?;
            println!("{} Message added ({} total)", "✓".green(), task.messages().len());
        }

        TaskAction::Complete { id } => {
            let mut task = resume(memory, &id).await?;
            task.complete()
                .await
                .with_context(|| format!("Failed to complete task {}", id))?;
            println!("{} Task completed: {}", "✓".green(), task.title().cyan());
        }

        TaskAction::Sync { id } => {
            let task = resume(memory, &id).await?;
            task.sync()
                .await
                .with_context(|| format!("Failed to sync task {}", id))?;
            println!("{} Task synced: {}", "✓".green(), task.title().cyan());
        }

        TaskAction::Show { id } => {
            let task = resume(memory, &id).await?;
            print_task(&task.metadata());
        }

        TaskAction::List => {
            let tasks = memory.list_tasks().await?;
            if tasks.is_empty() {
                println!("{}", "No tasks recorded.".yellow());
                return Ok(());
            }
            println!("{}", "Tasks".cyan().bold());
            println!("{}", "─".repeat(60));
            for task in &tasks {
                let status = if task.complete {
                    "✓".green()
                } else {
                    "○".yellow()
                };
                println!(
                    "  {} {} {} ({} messages, {})",
                    status,
                    task.id.dimmed(),
                    task.title,
                    task.messages.len(),
                    format_millis(task.timestamp)
                );
            }
        }
    }

    Ok(())
}

async fn resume(memory: std::sync::Arc<koder_core::MemoryManager>, id: &str) -> Result<Task> {
    Task::resume(memory, id)
        .await?
        .ok_or_else(|| anyhow!("Task not found: {}", id))
}

fn parse_role(role: &str) -> Role {
    match role {
        "assistant" => Role::Assistant,
        "system" => Role::System,
        _ => Role::User,
    }
}

fn print_task(task: &TaskMetadata) {
    let state = if task.complete {
        "complete".green()
    } else {
        "open".yellow()
    };
    println!("{} [{}]", task.title.cyan().bold(), state);
    println!("  ID:      {}", task.id);
    println!("  Created: {}", format_millis(task.timestamp));
    println!();

    for message in &task.messages {
        let role = match message.role {
            Role::User => "user".blue(),
            Role::Assistant => "assistant".green(),
            Role::System => "system".dimmed(),
        };
        println!("  {} {}", format_millis(message.timestamp).dimmed(), role);
        for line in message.content.lines() {
            println!("    {}", line);
        }
    }
}

fn format_millis(millis: i64) -> String {
    match Local.timestamp_millis_opt(millis).single() {
        Some(time) => time.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => DateTime::<Utc>::from_timestamp_millis(millis)
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| millis.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_role() {
        assert_eq!(parse_role("assistant"), Role::Assistant);
        assert_eq!(parse_role("system"), Role::System);
        assert_eq!(parse_role("user"), Role::User);
    }

    #[test]
    fn test_format_millis() {
        assert_eq!(format_millis(0).len(), "1970-01-01 00:00:00".len());
    }
}
