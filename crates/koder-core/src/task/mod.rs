//! Task ledger.
//!
//! A task is one conversation with its message history and completion flag.
//! Every mutation is persisted through [`MemoryManager::store_task_metadata`]
//! before it returns.

use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::memory::MemoryManager;
use crate::types::{FileInfo, Message, Role, TaskMetadata};

/// Title used when a task starts without a prompt.
pub const DEFAULT_TITLE: &str = "New Task";
const TITLE_MAX_CHARS: usize = 30;
const TITLE_TRUNCATED_CHARS: usize = 27;

/// What `record_file_edit` did with a proposed change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Created,
    Edited,
    Unchanged,
}

/// A persisted conversation
pub struct Task {
    memory: Arc<MemoryManager>,
    meta: TaskMetadata,
}

impl Task {
    /// Start a task. A supplied prompt sets the title and becomes the first
    /// user message.
    pub async fn new(memory: Arc<MemoryManager>, initial_prompt: Option<&str>) -> Result<Self> {
        let meta = TaskMetadata {
            id: Uuid::new_v4().to_string(),
            title: initial_prompt.map_or_else(|| DEFAULT_TITLE.to_string(), generate_title),
            timestamp: Utc::now().timestamp_millis(),
            messages: Vec::new(),
            complete: false,
        };
        let mut task = Self { memory, meta };

        match initial_prompt {
            Some(prompt) => task.add_message(Role::User, prompt).await?,
            None => task.sync().await?,
        }
        debug!("Started task {} ({})", task.meta.id, task.meta.title);
        Ok(task)
    }

    /// Reload a task from its local record.
    pub async fn resume(memory: Arc<MemoryManager>, id: &str) -> Result<Option<Self>> {
        Ok(memory
            .load_task_metadata(id)
            .await?
            .map(|meta| Self { memory, meta }))
    }

    pub fn id(&self) -> &str {
        &self.meta.id
    }

    pub fn title(&self) -> &str {
        &self.meta.title
    }

    pub fn is_complete(&self) -> bool {
        self.meta.complete
    }

    pub fn messages(&self) -> &[Message] {
        &self.meta.messages
    }

    /// Snapshot of the persisted record.
    pub fn metadata(&self) -> TaskMetadata {
        self.meta.clone()
    }

    /// Append a message and persist.
    ///
    /// Timestamps are strictly increasing within a task, even when two
    /// messages arrive within the same millisecond. If persisting fails the
    /// message is not kept, so the call can be retried.
    pub async fn add_message(&mut self, role: Role, content: impl Into<String>) -> Result<()> {
        let now = Utc::now().timestamp_millis();
        let timestamp = match self.meta.messages.last() {
            Some(last) if now <= last.timestamp => last.timestamp + 1,
            _ => now,
        };

        let mut next = self.meta.clone();
        next.messages.push(Message {
            role,
            content: content.into(),
            timestamp,
        });
        self.commit(next).await
    }

    /// Record the outcome of an approved file change.
    ///
    /// `previous` is the file's content before the change, `None` if it did
    /// not exist. Created and edited content is stored in memory and noted
    /// with a system message; identical content is left alone.
    pub async fn record_file_edit(
        &mut self,
        path: &str,
        previous: Option<&str>,
        new_content: &str,
    ) -> Result<EditOutcome> {
        let outcome = match previous {
            None => EditOutcome::Created,
            Some(old) if old == new_content => return Ok(EditOutcome::Unchanged),
            Some(_) => EditOutcome::Edited,
        };

        let file_type = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let info = FileInfo::new(path, new_content, file_type, Utc::now().to_rfc3339());
        self.memory.store_file(&info).await?;

        let note = match outcome {
            EditOutcome::Created => format!("Created file {}", path),
            _ => format!("Edited file {}", path),
        };
        self.add_message(Role::System, note).await?;
        Ok(outcome)
    }

    /// Mark the task complete. Completion happens once; a failed attempt
    /// leaves the task open so it can be retried.
    pub async fn complete(&mut self) -> Result<()> {
        if self.meta.complete {
            return Err(Error::TaskAlreadyComplete(self.meta.id.clone()));
        }
        let mut next = self.meta.clone();
        next.complete = true;
        self.commit(next).await
    }

    /// Persist `next` and adopt it only once both tiers accepted it.
    async fn commit(&mut self, next: TaskMetadata) -> Result<()> {
        self.memory.store_task_metadata(&next).await?;
        self.meta = next;
        Ok(())
    }

    /// Re-persist the current record, e.g. when a remote failure left the
    /// remote copy behind the local one.
    pub async fn sync(&self) -> Result<()> {
        self.memory.store_task_metadata(&self.meta).await
    }
}

/// Title from the first line of a prompt, truncated to 30 characters.
pub fn generate_title(prompt: &str) -> String {
    let first_line = prompt.lines().next().unwrap_or_default().trim();
    if first_line.chars().count() <= TITLE_MAX_CHARS {
        return first_line.to_string();
    }
    let mut title: String = first_line.chars().take(TITLE_TRUNCATED_CHARS).collect();
    title.push_str("...");
    title
}
