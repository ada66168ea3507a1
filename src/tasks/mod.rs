//! Task tracking collaborator.
//!
//! The task tools and the research engine talk to a [`TaskTracker`]; the
//! default tracker keeps everything in memory for the life of the process.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::error::{ToolError, ToolResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    fn is_open(&self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::InProgress)
    }
}

impl FromStr for TaskStatus {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "pending" | "todo" => Ok(TaskStatus::Pending),
            "in_progress" | "inprogress" | "active" => Ok(TaskStatus::InProgress),
            "completed" | "complete" | "done" => Ok(TaskStatus::Completed),
            "failed" | "error" => Ok(TaskStatus::Failed),
            other => Err(ToolError::BadRequest(format!(
                "Unknown task status '{}'; expected pending, in_progress, completed or failed",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl FromStr for TaskPriority {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(TaskPriority::Low),
            "medium" | "normal" => Ok(TaskPriority::Medium),
            "high" | "urgent" => Ok(TaskPriority::High),
            other => Err(ToolError::BadRequest(format!(
                "Unknown task priority '{}'; expected low, medium or high",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub notes: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub priority: TaskPriority,
    pub parent_id: Option<String>,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn under(mut self, parent_id: &str) -> Self {
        self.parent_id = Some(parent_id.to_string());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub note: Option<String>,
}

impl TaskUpdate {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskSession {
    pub id: String,
    pub goal: String,
    pub task_ids: Vec<String>,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusSummary {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
    pub progress_percent: u32,
    pub active_session: Option<String>,
}

#[async_trait]
pub trait TaskTracker: Send + Sync {
    async fn create(&self, task: NewTask) -> ToolResult<Task>;

    async fn update(&self, id: &str, update: TaskUpdate) -> ToolResult<Task>;

    /// Delete a task and its descendants; returns how many were removed.
    async fn delete(&self, id: &str) -> ToolResult<usize>;

    async fn get(&self, id: &str) -> ToolResult<Task>;

    async fn list(&self, parent_id: Option<&str>) -> ToolResult<Vec<Task>>;

    /// Create one child task per title under `id`.
    async fn breakdown(&self, id: &str, subtasks: Vec<String>) -> ToolResult<Vec<Task>>;

    /// Highest-priority pending task with no open children.
    async fn next(&self) -> ToolResult<Option<Task>>;

    async fn status(&self) -> ToolResult<StatusSummary>;

    async fn start_session(&self, goal: &str, task_ids: Vec<String>) -> ToolResult<TaskSession>;
}

#[derive(Default)]
struct TrackerState {
    // Insertion order doubles as creation order.
    tasks: Vec<Task>,
    session: Option<TaskSession>,
}

impl TrackerState {
    fn find(&self, id: &str) -> ToolResult<usize> {
        self.tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| ToolError::NotFound(format!("Task not found: {}", id)))
    }

    fn descendants(&self, id: &str) -> HashSet<String> {
        let mut found: HashSet<String> = HashSet::new();
        found.insert(id.to_string());
        loop {
            let before = found.len();
            for task in &self.tasks {
                if let Some(parent) = &task.parent_id {
                    if found.contains(parent) {
                        found.insert(task.id.clone());
                    }
                }
            }
            if found.len() == before {
                return found;
            }
        }
    }
}

#[derive(Default)]
pub struct InMemoryTaskTracker {
    state: Mutex<TrackerState>,
}

impl InMemoryTaskTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> ToolResult<std::sync::MutexGuard<'_, TrackerState>> {
        self.state
            .lock()
            .map_err(|_| ToolError::Internal("Task tracker state poisoned".to_string()))
    }
}

fn new_task(task: NewTask) -> ToolResult<Task> {
    if task.title.trim().is_empty() {
        return Err(ToolError::BadRequest("Task title must not be empty".to_string()));
    }
    let now = Utc::now();
    Ok(Task {
        id: Uuid::new_v4().to_string(),
        title: task.title.trim().to_string(),
        description: task.description,
        status: TaskStatus::Pending,
        priority: task.priority,
        parent_id: task.parent_id,
        notes: Vec::new(),
        created_at: now,
        updated_at: now,
    })
}

#[async_trait]
impl TaskTracker for InMemoryTaskTracker {
    async fn create(&self, task: NewTask) -> ToolResult<Task> {
        let mut state = self.lock()?;
        if let Some(parent) = &task.parent_id {
            state.find(parent)?;
        }
        let task = new_task(task)?;
        debug!(task = %task.id, title = %task.title, "task created");
        state.tasks.push(task.clone());
        Ok(task)
    }

    async fn update(&self, id: &str, update: TaskUpdate) -> ToolResult<Task> {
        let mut state = self.lock()?;
        let idx = state.find(id)?;
        let task = &mut state.tasks[idx];
        if let Some(title) = update.title {
            if title.trim().is_empty() {
                return Err(ToolError::BadRequest("Task title must not be empty".to_string()));
            }
            task.title = title.trim().to_string();
        }
        if let Some(description) = update.description {
            task.description = description;
        }
        if let Some(status) = update.status {
            task.status = status;
        }
        if let Some(priority) = update.priority {
            task.priority = priority;
        }
        if let Some(note) = update.note {
            task.notes.push(note);
        }
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    async fn delete(&self, id: &str) -> ToolResult<usize> {
        let mut state = self.lock()?;
        state.find(id)?;
        let doomed = state.descendants(id);
        state.tasks.retain(|t| !doomed.contains(&t.id));
        if let Some(session) = state.session.as_mut() {
            session.task_ids.retain(|t| !doomed.contains(t));
        }
        Ok(doomed.len())
    }

    async fn get(&self, id: &str) -> ToolResult<Task> {
        let state = self.lock()?;
        let idx = state.find(id)?;
        Ok(state.tasks[idx].clone())
    }

    async fn list(&self, parent_id: Option<&str>) -> ToolResult<Vec<Task>> {
        let state = self.lock()?;
        Ok(state
            .tasks
            .iter()
            .filter(|t| parent_id.map_or(true, |p| t.parent_id.as_deref() == Some(p)))
            .cloned()
            .collect())
    }

    async fn breakdown(&self, id: &str, subtasks: Vec<String>) -> ToolResult<Vec<Task>> {
        if subtasks.iter().all(|s| s.trim().is_empty()) {
            return Err(ToolError::BadRequest(
                "task_breakdown needs at least one subtask title".to_string(),
            ));
        }
        let mut state = self.lock()?;
        let parent_idx = state.find(id)?;
        let priority = state.tasks[parent_idx].priority;

        let mut created = Vec::new();
        for title in subtasks.into_iter().filter(|s| !s.trim().is_empty()) {
            let task = new_task(NewTask {
                title,
                description: String::new(),
                priority,
                parent_id: Some(id.to_string()),
            })?;
            state.tasks.push(task.clone());
            created.push(task);
        }
        Ok(created)
    }

    async fn next(&self) -> ToolResult<Option<Task>> {
        let state = self.lock()?;
        let has_open_children = |id: &str| {
            state
                .tasks
                .iter()
                .any(|t| t.parent_id.as_deref() == Some(id) && t.status.is_open())
        };
        // Reverse so max_by_key keeps the oldest of equal priority.
        Ok(state
            .tasks
            .iter()
            .rev()
            .filter(|t| t.status == TaskStatus::Pending && !has_open_children(&t.id))
            .max_by_key(|t| t.priority)
            .cloned())
    }

    async fn status(&self) -> ToolResult<StatusSummary> {
        let state = self.lock()?;
        let mut summary = StatusSummary {
            total: state.tasks.len(),
            active_session: state.session.as_ref().map(|s| s.id.clone()),
            ..StatusSummary::default()
        };
        for task in &state.tasks {
            match task.status {
                TaskStatus::Pending => summary.pending += 1,
                TaskStatus::InProgress => summary.in_progress += 1,
                TaskStatus::Completed => summary.completed += 1,
                TaskStatus::Failed => summary.failed += 1,
            }
        }
        if summary.total > 0 {
            summary.progress_percent = (summary.completed * 100 / summary.total) as u32;
        }
        Ok(summary)
    }

    async fn start_session(&self, goal: &str, task_ids: Vec<String>) -> ToolResult<TaskSession> {
        let mut state = self.lock()?;
        for id in &task_ids {
            state.find(id)?;
        }
        let session = TaskSession {
            id: Uuid::new_v4().to_string(),
            goal: goal.to_string(),
            task_ids,
            started_at: Utc::now(),
        };
        state.session = Some(session.clone());
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_breakdown_and_next() {
        let tracker = InMemoryTaskTracker::new();
        let parent = tracker
            .create(NewTask {
                priority: TaskPriority::High,
                ..NewTask::titled("Ship parser")
            })
            .await
            .unwrap();
        tracker
            .create(NewTask {
                priority: TaskPriority::Low,
                ..NewTask::titled("Tidy docs")
            })
            .await
            .unwrap();

        let children = tracker
            .breakdown(&parent.id, vec!["Lexer".into(), "".into(), "Grammar".into()])
            .await
            .unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].priority, TaskPriority::High);

        // The parent has open children, so the first child comes next.
        let next = tracker.next().await.unwrap().unwrap();
        assert_eq!(next.title, "Lexer");

        tracker
            .update(&children[0].id, TaskUpdate::status(TaskStatus::Completed))
            .await
            .unwrap();
        assert_eq!(tracker.next().await.unwrap().unwrap().title, "Grammar");
    }

    #[tokio::test]
    async fn test_delete_removes_descendants() {
        let tracker = InMemoryTaskTracker::new();
        let root = tracker.create(NewTask::titled("root")).await.unwrap();
        let child = tracker.create(NewTask::titled("child").under(&root.id)).await.unwrap();
        tracker.create(NewTask::titled("grandchild").under(&child.id)).await.unwrap();
        tracker.create(NewTask::titled("other")).await.unwrap();

        assert_eq!(tracker.delete(&root.id).await.unwrap(), 3);
        assert_eq!(tracker.list(None).await.unwrap().len(), 1);
        assert!(matches!(
            tracker.get(&child.id).await,
            Err(ToolError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_status_summary_and_notes() {
        let tracker = InMemoryTaskTracker::new();
        let a = tracker.create(NewTask::titled("a")).await.unwrap();
        tracker.create(NewTask::titled("b")).await.unwrap();
        let updated = tracker
            .update(&a.id, TaskUpdate::status(TaskStatus::Completed).with_note("done early"))
            .await
            .unwrap();
        assert_eq!(updated.notes, vec!["done early".to_string()]);

        let session = tracker.start_session("release", vec![a.id.clone()]).await.unwrap();
        let summary = tracker.status().await.unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.progress_percent, 50);
        assert_eq!(summary.active_session, Some(session.id));
    }

    #[test]
    fn test_parse_status_and_priority() {
        assert_eq!("in-progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert_eq!("HIGH".parse::<TaskPriority>().unwrap(), TaskPriority::High);
        assert!("soon".parse::<TaskPriority>().is_err());
    }
}
