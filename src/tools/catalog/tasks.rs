use serde::Deserialize;
use serde_json::{json, Value};

use super::to_payload;
use crate::error::{ToolError, ToolResult};
use crate::tasks::{NewTask, TaskPriority, TaskStatus, TaskUpdate};
use crate::tools::context::ToolContext;
use crate::tools::params::{parse_args, ParamSpec, ParamType};
use crate::tools::registry::{handler, ToolDescriptor};

const STATUSES: &[&str] = &["pending", "in_progress", "completed", "failed"];
const PRIORITIES: &[&str] = &["low", "medium", "high"];

pub(super) fn tools() -> Vec<ToolDescriptor> {
    let task_id = || ParamSpec::string("task_id", "Task identifier").required();
    vec![
        ToolDescriptor::new("task_create", "Create a task, optionally under a parent task.", handler(task_create))
            .param(ParamSpec::string("title", "Short title").required())
            .param(ParamSpec::string("description", "Details"))
            .param(ParamSpec::string("priority", "Task priority").one_of(PRIORITIES))
            .param(ParamSpec::string("parent_id", "Parent task identifier")),
        ToolDescriptor::new(
            "task_update",
            "Change a task's status, priority, title or description, or add a note.",
            handler(task_update),
        )
        .param(task_id())
        .param(ParamSpec::string("status", "New status").one_of(STATUSES))
        .param(ParamSpec::string("priority", "New priority").one_of(PRIORITIES))
        .param(ParamSpec::string("title", "New title"))
        .param(ParamSpec::string("description", "New description"))
        .param(ParamSpec::string("note", "Progress note to append")),
        ToolDescriptor::new("task_delete", "Delete a task and its subtasks.", handler(task_delete))
            .param(task_id()),
        ToolDescriptor::new("task_breakdown", "Split a task into ordered subtasks.", handler(task_breakdown))
            .param(task_id())
            .param(ParamSpec::array("subtasks", ParamType::String, "Subtask titles in order").required()),
        ToolDescriptor::new(
            "task_get_next",
            "The next open task to work on: in-progress first, then highest priority.",
            handler(task_get_next),
        ),
        ToolDescriptor::new("task_get_status", "Counts of tasks by status and overall progress.", handler(task_get_status)),
        ToolDescriptor::new(
            "start_task_session",
            "Start a work session toward a goal over a set of tasks.",
            handler(start_task_session),
        )
        .param(ParamSpec::string("goal", "What the session should achieve").required())
        .param(ParamSpec::array("task_ids", ParamType::String, "Tasks in scope")),
    ]
}

#[derive(Deserialize)]
struct CreateArgs {
    title: String,
    #[serde(default)]
    description: String,
    priority: Option<String>,
    parent_id: Option<String>,
}

async fn task_create(ctx: ToolContext, args: Value) -> ToolResult<Value> {
    let args: CreateArgs = parse_args("task_create", args)?;
    if args.title.trim().is_empty() {
        return Err(ToolError::BadRequest("title must not be empty".to_string()));
    }
    let new = NewTask {
        title: args.title.trim().to_string(),
        description: args.description,
        priority: args
            .priority
            .as_deref()
            .map(str::parse::<TaskPriority>)
            .transpose()?
            .unwrap_or_default(),
        parent_id: args.parent_id,
    };
    let task = ctx.services.tasks.create(new).await?;
    to_payload(&task)
}

#[derive(Deserialize)]
struct UpdateArgs {
    task_id: String,
    status: Option<String>,
    priority: Option<String>,
    title: Option<String>,
    description: Option<String>,
    note: Option<String>,
}

async fn task_update(ctx: ToolContext, args: Value) -> ToolResult<Value> {
    let args: UpdateArgs = parse_args("task_update", args)?;
    let update = TaskUpdate {
        title: args.title,
        description: args.description,
        status: args.status.as_deref().map(str::parse::<TaskStatus>).transpose()?,
        priority: args
            .priority
            .as_deref()
            .map(str::parse::<TaskPriority>)
            .transpose()?,
        note: args.note,
    };
    let task = ctx.services.tasks.update(&args.task_id, update).await?;
    to_payload(&task)
}

#[derive(Deserialize)]
struct IdArgs {
    task_id: String,
}

async fn task_delete(ctx: ToolContext, args: Value) -> ToolResult<Value> {
    let args: IdArgs = parse_args("task_delete", args)?;
    let removed = ctx.services.tasks.delete(&args.task_id).await?;
    Ok(json!({ "task_id": args.task_id, "removed": removed }))
}

#[derive(Deserialize)]
struct BreakdownArgs {
    task_id: String,
    subtasks: Vec<String>,
}

async fn task_breakdown(ctx: ToolContext, args: Value) -> ToolResult<Value> {
    let args: BreakdownArgs = parse_args("task_breakdown", args)?;
    let titles: Vec<String> = args
        .subtasks
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if titles.is_empty() {
        return Err(ToolError::BadRequest("subtasks must not be empty".to_string()));
    }
    let created = ctx.services.tasks.breakdown(&args.task_id, titles).await?;
    Ok(json!({
        "task_id": args.task_id,
        "subtasks": to_payload(&created)?,
    }))
}

async fn task_get_next(ctx: ToolContext, _args: Value) -> ToolResult<Value> {
    match ctx.services.tasks.next().await? {
        Some(task) => Ok(json!({ "task": to_payload(&task)? })),
        None => Ok(json!({ "task": null, "message": "No open tasks" })),
    }
}

async fn task_get_status(ctx: ToolContext, _args: Value) -> ToolResult<Value> {
    let summary = ctx.services.tasks.status().await?;
    to_payload(&summary)
}

#[derive(Deserialize)]
struct SessionArgs {
    goal: String,
    #[serde(default)]
    task_ids: Vec<String>,
}

async fn start_task_session(ctx: ToolContext, args: Value) -> ToolResult<Value> {
    let args: SessionArgs = parse_args("start_task_session", args)?;
    if args.goal.trim().is_empty() {
        return Err(ToolError::BadRequest("goal must not be empty".to_string()));
    }
    let session = ctx
        .services
        .tasks
        .start_session(args.goal.trim(), args.task_ids)
        .await?;
    to_payload(&session)
}
