use chrono::{DateTime, Utc};
use regex::RegexBuilder;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;

use super::{load_file, number_lines, to_payload};
use crate::analysis::Language;
use crate::error::{ToolError, ToolResult};
use crate::tools::context::ToolContext;
use crate::tools::params::{parse_args, ParamSpec, ParamType};
use crate::tools::registry::{handler, ToolDescriptor};
use crate::worker::WorkerTask;
use crate::workspace::{scanner, LineMatch};

const MAX_STRUCTURE_ENTRIES: usize = 2_000;
const MAX_SEARCH_MATCHES: usize = 200;
const MAX_MULTI_READ: usize = 20;

pub(super) fn tools() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new(
            "get_project_structure",
            "Show the directory tree of the workspace or one of its folders, honoring ignore rules.",
            handler(get_project_structure),
        )
        .param(ParamSpec::string("path", "Folder to list, relative to the workspace root"))
        .param(ParamSpec::integer("max_depth", "Maximum depth to descend"))
        .requires_project()
        .cacheable(),
        ToolDescriptor::new(
            "read_file",
            "Read the full contents of a file. Use include_line_numbers before editing by line or diff.",
            handler(read_file),
        )
        .param(ParamSpec::string("filename", "File path relative to the workspace root").required())
        .param(ParamSpec::boolean("include_line_numbers", "Prefix each line with 'N: '"))
        .requires_project()
        .cacheable(),
        ToolDescriptor::new(
            "read_file_lines",
            "Read a 1-based inclusive line range of a file, with line numbers.",
            handler(read_file_lines),
        )
        .param(ParamSpec::string("filename", "File path").required())
        .param(ParamSpec::integer("start_line", "First line (1-based)").required())
        .param(ParamSpec::integer("end_line", "Last line, inclusive; defaults to the end of file"))
        .requires_project(),
        ToolDescriptor::new(
            "read_multiple_files",
            "Read several files at once; failures are reported per file.",
            handler(read_multiple_files),
        )
        .param(ParamSpec::array("filenames", ParamType::String, "File paths").required())
        .param(ParamSpec::boolean("include_line_numbers", "Prefix each line with 'N: '"))
        .requires_project(),
        ToolDescriptor::new(
            "search_in_file",
            "Search one file for a regex (case-insensitive by default; invalid regexes match literally).",
            handler(search_in_file),
        )
        .param(ParamSpec::string("filename", "File path").required())
        .param(ParamSpec::string("pattern", "Regular expression or literal text").required())
        .param(ParamSpec::integer("context", "Lines of context around each match"))
        .param(ParamSpec::boolean("case_sensitive", "Match case exactly"))
        .requires_project()
        .cacheable(),
        ToolDescriptor::new(
            "search_code",
            "Search the content of every indexed file for a term.",
            handler(search_code),
        )
        .param(ParamSpec::string("search_term", "Text to look for (case-insensitive)").required())
        .param(ParamSpec::integer("context", "Lines of context around each match"))
        .param(ParamSpec::integer("max_results", "Maximum number of files to return"))
        .requires_project(),
        ToolDescriptor::new(
            "get_file_info",
            "Size, modification time, language and line count of a file or folder.",
            handler(get_file_info),
        )
        .param(ParamSpec::string("filename", "File or folder path").required())
        .requires_project(),
    ]
}

#[derive(Deserialize)]
struct StructureArgs {
    path: Option<String>,
    max_depth: Option<usize>,
}

async fn get_project_structure(ctx: ToolContext, args: Value) -> ToolResult<Value> {
    let args: StructureArgs = parse_args("get_project_structure", args)?;
    let ws = ctx.workspace()?.clone();

    let rel = match args.path.as_deref().map(str::trim) {
        None | Some("") | Some(".") | Some("/") => String::new(),
        Some(raw) => ws.normalize(raw)?,
    };
    let start = ws.root().join(&rel);
    if !start.is_dir() {
        return Err(ToolError::NotFound(format!("Directory not found: {}", rel)));
    }

    let walk_ws = ws.clone();
    let max_depth = args.max_depth;
    let entries = tokio::task::spawn_blocking(move || scanner::walk(&walk_ws, &start, max_depth))
        .await
        .map_err(|e| ToolError::Internal(format!("Directory walk failed: {}", e)))?;

    let prefix = if rel.is_empty() {
        String::new()
    } else {
        format!("{}/", rel)
    };
    let mut lines = Vec::new();
    let (mut files, mut directories) = (0usize, 0usize);
    for entry in entries.iter().take(MAX_STRUCTURE_ENTRIES) {
        let inner = entry.relative.strip_prefix(&prefix).unwrap_or(&entry.relative);
        let depth = inner.matches('/').count();
        let name = inner.rsplit('/').next().unwrap_or(inner);
        if entry.is_dir {
            directories += 1;
            lines.push(format!("{}{}/", "  ".repeat(depth), name));
        } else {
            files += 1;
            lines.push(format!("{}{}", "  ".repeat(depth), name));
        }
    }

    let root_label = if rel.is_empty() { ws.root_name() } else { rel.clone() };
    Ok(json!({
        "root": root_label,
        "path": rel,
        "structure": format!("{}/\n{}", root_label, lines.join("\n")),
        "files": files,
        "directories": directories,
        "truncated": entries.len() > MAX_STRUCTURE_ENTRIES,
    }))
}

#[derive(Deserialize)]
struct ReadFileArgs {
    filename: String,
    #[serde(default)]
    include_line_numbers: bool,
}

async fn read_file(ctx: ToolContext, args: Value) -> ToolResult<Value> {
    let args: ReadFileArgs = parse_args("read_file", args)?;
    let file = load_file(ctx.workspace()?, &args.filename).await?;
    let line_count = file.content.lines().count();
    let content = if args.include_line_numbers {
        number_lines(file.content.lines(), 1)
    } else {
        file.content
    };
    Ok(json!({
        "filename": file.rel,
        "content": content,
        "lines": line_count,
    }))
}

#[derive(Deserialize)]
struct ReadLinesArgs {
    filename: String,
    start_line: usize,
    end_line: Option<usize>,
}

async fn read_file_lines(ctx: ToolContext, args: Value) -> ToolResult<Value> {
    let args: ReadLinesArgs = parse_args("read_file_lines", args)?;
    let file = load_file(ctx.workspace()?, &args.filename).await?;
    let lines: Vec<&str> = file.content.lines().collect();
    let total = lines.len();

    let start = args.start_line;
    let end = args.end_line.unwrap_or(total).min(total);
    if start < 1 || start > total.max(1) || end < start {
        return Err(ToolError::BadRequest(format!(
            "Invalid line range {}-{}: {} has {} lines",
            start,
            args.end_line.unwrap_or(total),
            file.rel,
            total
        )));
    }

    Ok(json!({
        "filename": file.rel,
        "start_line": start,
        "end_line": end,
        "total_lines": total,
        "content": number_lines(lines[start - 1..end].iter().copied(), start),
    }))
}

#[derive(Deserialize)]
struct ReadManyArgs {
    filenames: Vec<String>,
    #[serde(default)]
    include_line_numbers: bool,
}

async fn read_multiple_files(ctx: ToolContext, args: Value) -> ToolResult<Value> {
    let args: ReadManyArgs = parse_args("read_multiple_files", args)?;
    if args.filenames.is_empty() {
        return Err(ToolError::BadRequest("filenames must not be empty".to_string()));
    }
    if args.filenames.len() > MAX_MULTI_READ {
        return Err(ToolError::BadRequest(format!(
            "At most {} files can be read at once",
            MAX_MULTI_READ
        )));
    }

    let ws = ctx.workspace()?;
    let mut files = Vec::with_capacity(args.filenames.len());
    let mut failed = 0;
    for name in &args.filenames {
        match load_file(ws, name).await {
            Ok(file) => {
                let content = if args.include_line_numbers {
                    number_lines(file.content.lines(), 1)
                } else {
                    file.content
                };
                files.push(json!({"filename": file.rel, "content": content}));
            }
            Err(e) => {
                failed += 1;
                files.push(json!({
                    "filename": name,
                    "error": {"kind": e.kind(), "message": e.message()},
                }));
            }
        }
    }
    Ok(json!({"files": files, "read": args.filenames.len() - failed, "failed": failed}))
}

#[derive(Deserialize)]
struct SearchInFileArgs {
    filename: String,
    pattern: String,
    #[serde(default)]
    context: usize,
    #[serde(default)]
    case_sensitive: bool,
}

async fn search_in_file(ctx: ToolContext, args: Value) -> ToolResult<Value> {
    let args: SearchInFileArgs = parse_args("search_in_file", args)?;
    if args.pattern.is_empty() {
        return Err(ToolError::BadRequest("pattern must not be empty".to_string()));
    }
    let file = load_file(ctx.workspace()?, &args.filename).await?;

    let (regex, literal) = match RegexBuilder::new(&args.pattern)
        .case_insensitive(!args.case_sensitive)
        .build()
    {
        Ok(regex) => (regex, false),
        Err(_) => (
            RegexBuilder::new(&regex::escape(&args.pattern))
                .case_insensitive(!args.case_sensitive)
                .build()
                .map_err(|e| ToolError::BadRequest(format!("Invalid pattern: {}", e)))?,
            true,
        ),
    };

    let lines: Vec<&str> = file.content.lines().collect();
    let mut total = 0;
    let mut matches = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        if !regex.is_match(line) {
            continue;
        }
        total += 1;
        if matches.len() >= MAX_SEARCH_MATCHES {
            continue;
        }
        let context = if args.context == 0 {
            Vec::new()
        } else {
            let lo = idx.saturating_sub(args.context);
            let hi = (idx + args.context + 1).min(lines.len());
            (lo..hi).map(|i| format!("{}: {}", i + 1, lines[i])).collect()
        };
        matches.push(LineMatch {
            line: idx + 1,
            text: line.to_string(),
            context,
        });
    }

    Ok(json!({
        "filename": file.rel,
        "pattern": args.pattern,
        "literal": literal,
        "total": total,
        "matches": to_payload(&matches)?,
    }))
}

#[derive(Deserialize)]
struct SearchCodeArgs {
    search_term: String,
    #[serde(default)]
    context: usize,
    max_results: Option<usize>,
}

async fn search_code(ctx: ToolContext, args: Value) -> ToolResult<Value> {
    let args: SearchCodeArgs = parse_args("search_code", args)?;
    let term = args.search_term.trim().to_string();
    if term.is_empty() {
        return Err(ToolError::BadRequest("search_term must not be empty".to_string()));
    }

    let services = &ctx.services;
    let mut index = services.indexer.snapshot();
    if index.is_empty() {
        services.indexer.build_or_update(ctx.workspace()?).await?;
        index = services.indexer.snapshot();
    }

    let offloaded = services
        .workers
        .run_with_fallback(WorkerTask::SearchContent {
            index,
            term: term.clone(),
            context: args.context,
            max_files: args.max_results.unwrap_or(50).max(1),
        })
        .await?;

    let files = offloaded.value.as_array().map(Vec::len).unwrap_or(0);
    Ok(json!({
        "search_term": term,
        "files": files,
        "results": offloaded.value,
        "fallback": offloaded.fallback,
    }))
}

#[derive(Deserialize)]
struct FileInfoArgs {
    filename: String,
}

async fn get_file_info(ctx: ToolContext, args: Value) -> ToolResult<Value> {
    let args: FileInfoArgs = parse_args("get_file_info", args)?;
    let ws = ctx.workspace()?;
    let rel = ws.normalize(&args.filename)?;
    let abs = ws.root().join(&rel);
    let meta = tokio::fs::metadata(&abs)
        .await
        .map_err(|e| ToolError::from_io(e, &rel))?;
    let modified = meta.modified().ok().map(|t| DateTime::<Utc>::from(t).to_rfc3339());

    if meta.is_dir() {
        let children = std::fs::read_dir(&abs).map(|d| d.count()).unwrap_or(0);
        return Ok(json!({
            "filename": rel,
            "type": "directory",
            "entries": children,
            "modified": modified,
        }));
    }

    let language = Language::from_path(&rel);
    let lines = if meta.len() <= scanner::MAX_INDEXED_FILE_SIZE {
        tokio::fs::read(&abs)
            .await
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .map(|text| text.lines().count())
    } else {
        None
    };

    Ok(json!({
        "filename": rel,
        "type": "file",
        "size": meta.len(),
        "modified": modified,
        "language": language.as_str(),
        "lines": lines,
        "is_text": lines.is_some(),
        "indexable": Path::new(&rel)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| ctx.services.config.is_text_extension(ext)),
    }))
}
