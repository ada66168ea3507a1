use serde::Deserialize;
use serde_json::Value;

use super::to_payload;
use crate::edit::LineEdit;
use crate::error::{ToolError, ToolResult};
use crate::tools::context::ToolContext;
use crate::tools::params::{parse_args, ParamSpec, ParamType};
use crate::tools::registry::{handler, ToolDescriptor};

const DIFF_FORMAT: &str = "One or more blocks:\n<<<<<<< SEARCH\n:start_line:N\n-------\n<exact lines to find>\n=======\n<replacement lines>\n>>>>>>> REPLACE";

fn mutation(name: &str, description: &str, h: crate::tools::registry::ToolHandler) -> ToolDescriptor {
    ToolDescriptor::new(name, description, h)
        .requires_project()
        .creates_checkpoint()
}

pub(super) fn tools() -> Vec<ToolDescriptor> {
    vec![
        mutation("create_file", "Create a new file. Fails if it already exists.", handler(create_file))
            .param(ParamSpec::string("filename", "File path relative to the workspace root").required())
            .param(ParamSpec::string("content", "Initial content")),
        mutation("delete_file", "Delete a file. Undo restores it.", handler(delete_file))
            .param(ParamSpec::string("filename", "File path").required()),
        mutation("rename_file", "Rename or move a file.", handler(rename_file))
            .param(ParamSpec::string("old_path", "Current path").required())
            .param(ParamSpec::string("new_path", "New path").required()),
        mutation("create_folder", "Create a folder and any missing parents.", handler(create_folder))
            .param(ParamSpec::string("path", "Folder path").required()),
        mutation("delete_folder", "Delete a folder and everything in it. Undo restores its files.", handler(delete_folder))
            .param(ParamSpec::string("path", "Folder path").required()),
        mutation("rename_folder", "Rename or move a folder.", handler(rename_folder))
            .param(ParamSpec::string("old_path", "Current path").required())
            .param(ParamSpec::string("new_path", "New path").required()),
        mutation(
            "edit_file",
            "Edit a file either by replacing its whole content or with line edits \
             ({type: replace_lines, start_line, end_line, expected_content, new_content} or \
             {type: insert_lines, line_number, new_content}). Provide exactly one of content or edits.",
            handler(edit_file),
        )
        .param(ParamSpec::string("filename", "File path").required())
        .param(ParamSpec::string("content", "Full replacement content"))
        .param(ParamSpec::array("edits", ParamType::Object, "Line edits, validated against the current file")),
        mutation(
            "apply_diff",
            &format!("Apply SEARCH/REPLACE blocks to a file. {}", DIFF_FORMAT),
            handler(apply_diff),
        )
        .param(ParamSpec::string("filename", "File path").required())
        .param(ParamSpec::string("diff", "SEARCH/REPLACE blocks").required()),
        mutation("append_to_file", "Append content to a file, creating it when missing.", handler(append_to_file))
            .param(ParamSpec::string("filename", "File path").required())
            .param(ParamSpec::string("content", "Content to append").required()),
        mutation("undo_last_change", "Revert the most recent file change made by a tool.", handler(undo_last_change)),
    ]
}

#[derive(Deserialize)]
struct FileContentArgs {
    filename: String,
    #[serde(default)]
    content: String,
}

async fn create_file(ctx: ToolContext, args: Value) -> ToolResult<Value> {
    let args: FileContentArgs = parse_args("create_file", args)?;
    let outcome = ctx
        .services
        .edits
        .create_file(ctx.workspace()?, &args.filename, &args.content)
        .await?;
    to_payload(&outcome)
}

async fn append_to_file(ctx: ToolContext, args: Value) -> ToolResult<Value> {
    let args: FileContentArgs = parse_args("append_to_file", args)?;
    let outcome = ctx
        .services
        .edits
        .append(ctx.workspace()?, &args.filename, &args.content)
        .await?;
    to_payload(&outcome)
}

#[derive(Deserialize)]
struct FileArgs {
    filename: String,
}

async fn delete_file(ctx: ToolContext, args: Value) -> ToolResult<Value> {
    let args: FileArgs = parse_args("delete_file", args)?;
    let outcome = ctx
        .services
        .edits
        .delete_file(ctx.workspace()?, &args.filename)
        .await?;
    to_payload(&outcome)
}

#[derive(Deserialize)]
struct RenameArgs {
    old_path: String,
    new_path: String,
}

async fn rename_file(ctx: ToolContext, args: Value) -> ToolResult<Value> {
    let args: RenameArgs = parse_args("rename_file", args)?;
    let outcome = ctx
        .services
        .edits
        .rename_file(ctx.workspace()?, &args.old_path, &args.new_path)
        .await?;
    to_payload(&outcome)
}

async fn rename_folder(ctx: ToolContext, args: Value) -> ToolResult<Value> {
    let args: RenameArgs = parse_args("rename_folder", args)?;
    let outcome = ctx
        .services
        .edits
        .rename_folder(ctx.workspace()?, &args.old_path, &args.new_path)
        .await?;
    to_payload(&outcome)
}

#[derive(Deserialize)]
struct FolderArgs {
    path: String,
}

async fn create_folder(ctx: ToolContext, args: Value) -> ToolResult<Value> {
    let args: FolderArgs = parse_args("create_folder", args)?;
    let outcome = ctx
        .services
        .edits
        .create_folder(ctx.workspace()?, &args.path)
        .await?;
    to_payload(&outcome)
}

async fn delete_folder(ctx: ToolContext, args: Value) -> ToolResult<Value> {
    let args: FolderArgs = parse_args("delete_folder", args)?;
    let outcome = ctx
        .services
        .edits
        .delete_folder(ctx.workspace()?, &args.path)
        .await?;
    to_payload(&outcome)
}

#[derive(Deserialize)]
struct EditFileArgs {
    filename: String,
    content: Option<String>,
    edits: Option<Vec<LineEdit>>,
}

async fn edit_file(ctx: ToolContext, args: Value) -> ToolResult<Value> {
    let args: EditFileArgs = parse_args("edit_file", args)?;
    let ws = ctx.workspace()?;
    let edits = &ctx.services.edits;
    let outcome = match (args.content, args.edits) {
        (Some(content), None) => edits.rewrite(ws, &args.filename, &content).await?,
        (None, Some(line_edits)) => edits.edit_lines(ws, &args.filename, &line_edits).await?,
        (Some(_), Some(_)) => {
            return Err(ToolError::BadRequest(
                "Provide either content or edits, not both".to_string(),
            ))
        }
        (None, None) => {
            return Err(ToolError::BadRequest(
                "edit_file needs content (full rewrite) or edits (line edits)".to_string(),
            ))
        }
    };
    to_payload(&outcome)
}

#[derive(Deserialize)]
struct DiffArgs {
    filename: String,
    diff: String,
}

async fn apply_diff(ctx: ToolContext, args: Value) -> ToolResult<Value> {
    let args: DiffArgs = parse_args("apply_diff", args)?;
    let outcome = ctx
        .services
        .edits
        .apply_diff(ctx.workspace()?, &args.filename, &args.diff)
        .await?;
    to_payload(&outcome)
}

async fn undo_last_change(ctx: ToolContext, _args: Value) -> ToolResult<Value> {
    let outcome = ctx.services.edits.undo_last_change(ctx.workspace()?).await?;
    to_payload(&outcome)
}
