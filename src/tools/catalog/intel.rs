//! Code intelligence tools.
//!
//! CPU-bound analysis goes through the worker pool; every result carries
//! `fallback: true` when the pool was unavailable and the work ran
//! in-process instead.

use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use super::{load_file, number_lines, to_payload, LoadedFile};
use crate::analysis::{
    architecture_suggestions, complexity_of, AstOutline, Language, QualityReport,
    ValidationReport,
};
use crate::error::{ToolError, ToolResult};
use crate::research::concept_tokens;
use crate::tools::context::ToolContext;
use crate::tools::params::{parse_args, ParamSpec, ParamType};
use crate::tools::registry::{handler, ToolDescriptor};
use crate::worker::{batch_entry, Offloaded, SourceFile, WorkerTask};
use crate::workspace::{todo_count, CodeIndex, Workspace};

const MAX_BATCH_FILES: usize = 50;
const RELEVANT_FILES: usize = 10;
const LARGEST_FILES: usize = 10;

pub(super) fn tools() -> Vec<ToolDescriptor> {
    let filename = || ParamSpec::string("filename", "File path relative to the workspace root").required();
    vec![
        ToolDescriptor::new(
            "analyze_code",
            "Structural outline (functions, types, methods) and size/complexity metrics of a file.",
            handler(analyze_code),
        )
        .param(filename())
        .requires_project(),
        ToolDescriptor::new(
            "validate_syntax",
            "Check a file, or inline content, for syntax errors.",
            handler(validate_syntax),
        )
        .param(ParamSpec::string("filename", "File to validate"))
        .param(ParamSpec::string("content", "Inline content to validate instead of a file"))
        .param(ParamSpec::string("language", "Language of inline content, e.g. rust, python, json")),
        ToolDescriptor::new(
            "analyze_symbol",
            "Definitions and references of a symbol in one file or across the indexed workspace.",
            handler(analyze_symbol),
        )
        .param(ParamSpec::string("symbol", "Identifier to look up").required())
        .param(ParamSpec::string("filename", "Restrict the search to this file"))
        .requires_project(),
        ToolDescriptor::new(
            "build_symbol_table",
            "Map every symbol defined in a file to its kinds and line ranges.",
            handler(build_symbol_table),
        )
        .param(filename())
        .requires_project(),
        ToolDescriptor::new(
            "trace_data_flow",
            "Declarations, assignments, mutations and reads of a variable, in order.",
            handler(trace_data_flow),
        )
        .param(ParamSpec::string("variable", "Variable name").required())
        .param(filename())
        .requires_project(),
        ToolDescriptor::new(
            "debug_systematically",
            "Gather syntax issues, complexity hotspots and lines related to an error message, with ordered hypotheses.",
            handler(debug_systematically),
        )
        .param(filename())
        .param(ParamSpec::string("error_message", "Error text or stack trace being debugged"))
        .requires_project(),
        ToolDescriptor::new(
            "analyze_code_quality",
            "Quality metrics, score, grade and issues for a file.",
            handler(analyze_code_quality),
        )
        .param(filename())
        .requires_project(),
        ToolDescriptor::new(
            "solve_engineering_problem",
            "Find files relevant to a problem statement and propose ordered steps.",
            handler(solve_engineering_problem),
        )
        .param(ParamSpec::string("problem", "Problem description").required())
        .requires_project(),
        ToolDescriptor::new(
            "get_engineering_insights",
            "Workspace-wide statistics from the code index: languages, definitions, TODOs, largest files.",
            handler(get_engineering_insights),
        )
        .requires_project(),
        ToolDescriptor::new(
            "optimize_code_architecture",
            "Refactoring suggestions for a file derived from its quality metrics.",
            handler(optimize_code_architecture),
        )
        .param(filename())
        .requires_project(),
        ToolDescriptor::new(
            "explain_code_section",
            "Text, symbols and complexity of a line range.",
            handler(explain_code_section),
        )
        .param(filename())
        .param(ParamSpec::integer("start_line", "First line (1-based)").required())
        .param(ParamSpec::integer("end_line", "Last line, inclusive").required())
        .requires_project(),
        ToolDescriptor::new(
            "batch_analyze_files",
            "Quality analysis for several files; failures are reported per file.",
            handler(batch_analyze_files),
        )
        .param(ParamSpec::array("filenames", ParamType::String, "File paths").required())
        .requires_project(),
        ToolDescriptor::new(
            "batch_validate_files",
            "Syntax validation for several files; failures are reported per file.",
            handler(batch_validate_files),
        )
        .param(ParamSpec::array("filenames", ParamType::String, "File paths").required())
        .requires_project(),
        ToolDescriptor::new(
            "clear_cache_for_file",
            "Drop cached tool results and syntax validation results for a path.",
            handler(clear_cache_for_file),
        )
        .param(filename()),
    ]
}

fn source(file: &LoadedFile) -> SourceFile {
    SourceFile {
        path: file.rel.clone(),
        content: file.content.clone(),
    }
}

async fn offload(ctx: &ToolContext, task: WorkerTask) -> ToolResult<Offloaded> {
    ctx.services.workers.run_with_fallback(task).await
}

fn decode<T: serde::de::DeserializeOwned>(value: Value) -> ToolResult<T> {
    serde_json::from_value(value)
        .map_err(|e| ToolError::Internal(format!("Unexpected worker result: {}", e)))
}

/// Index snapshot, building it first when empty.
async fn ensure_index(ctx: &ToolContext, ws: &Workspace) -> ToolResult<std::sync::Arc<CodeIndex>> {
    let indexer = &ctx.services.indexer;
    if indexer.snapshot().is_empty() {
        indexer.build_or_update(ws).await?;
    }
    Ok(indexer.snapshot())
}

#[derive(Deserialize)]
struct FileArgs {
    filename: String,
}

async fn analyze_code(ctx: ToolContext, args: Value) -> ToolResult<Value> {
    let args: FileArgs = parse_args("analyze_code", args)?;
    let file = load_file(ctx.workspace()?, &args.filename).await?;

    let mut results = ctx
        .services
        .workers
        .execute_batch(vec![
            WorkerTask::ParseAst {
                file: source(&file),
                include_nested: false,
            },
            WorkerTask::QualityMetrics { file: source(&file) },
        ])
        .await
        .into_iter();
    let outline = results
        .next()
        .ok_or_else(|| ToolError::Internal("Missing outline result".into()))??;
    let quality = results
        .next()
        .ok_or_else(|| ToolError::Internal("Missing metrics result".into()))??;

    let fallback = outline.fallback || quality.fallback;
    Ok(json!({
        "filename": file.rel,
        "outline": outline.value,
        "metrics": quality.value.get("metrics").cloned().unwrap_or(Value::Null),
        "fallback": fallback,
    }))
}

#[derive(Deserialize)]
struct ValidateArgs {
    filename: Option<String>,
    content: Option<String>,
    language: Option<String>,
}

async fn validate_syntax(ctx: ToolContext, args: Value) -> ToolResult<Value> {
    let args: ValidateArgs = parse_args("validate_syntax", args)?;
    let (file, language) = match (args.content, args.filename) {
        (Some(content), filename) => {
            if args.language.is_none() && filename.is_none() {
                return Err(ToolError::BadRequest(
                    "Inline content needs a language or a filename to infer it from".to_string(),
                ));
            }
            let path = filename.unwrap_or_else(|| "inline".to_string());
            (SourceFile { path, content }, args.language)
        }
        (None, Some(filename)) => {
            let file = load_file(ctx.workspace()?, &filename).await?;
            (source(&file), args.language)
        }
        (None, None) => {
            return Err(ToolError::BadRequest(
                "validate_syntax needs a filename or inline content".to_string(),
            ))
        }
    };

    let path = file.path.clone();
    let offloaded = offload(&ctx, WorkerTask::ValidateSyntax { file, language }).await?;
    let report: ValidationReport = decode(offloaded.value)?;
    let message = if report.valid {
        format!("No syntax errors in {} ({})", path, report.language)
    } else {
        format!(
            "{} syntax issue(s) in {}:\n{}",
            report.issues.len(),
            path,
            report.summary()
        )
    };
    Ok(json!({
        "filename": path,
        "message": message,
        "report": to_payload(&report)?,
        "fallback": offloaded.fallback,
    }))
}

#[derive(Deserialize)]
struct SymbolArgs {
    symbol: String,
    filename: Option<String>,
}

async fn analyze_symbol(ctx: ToolContext, args: Value) -> ToolResult<Value> {
    let args: SymbolArgs = parse_args("analyze_symbol", args)?;
    let symbol = args.symbol.trim().to_string();
    if symbol.is_empty() {
        return Err(ToolError::BadRequest("symbol must not be empty".to_string()));
    }
    let ws = ctx.workspace()?;

    let files = match &args.filename {
        Some(name) => vec![source(&load_file(ws, name).await?)],
        None => ensure_index(&ctx, ws)
            .await?
            .files
            .values()
            .filter(|record| record.content.contains(&symbol))
            .map(|record| SourceFile {
                path: record.path.clone(),
                content: record.content.clone(),
            })
            .collect(),
    };
    let scanned = files.len();

    let offloaded = offload(&ctx, WorkerTask::ResolveSymbols { symbol, files }).await?;
    let mut payload = offloaded.value;
    if let Some(obj) = payload.as_object_mut() {
        obj.insert("files_scanned".into(), json!(scanned));
        obj.insert("fallback".into(), json!(offloaded.fallback));
    }
    Ok(payload)
}

async fn build_symbol_table(ctx: ToolContext, args: Value) -> ToolResult<Value> {
    let args: FileArgs = parse_args("build_symbol_table", args)?;
    let file = load_file(ctx.workspace()?, &args.filename).await?;
    let offloaded = offload(&ctx, WorkerTask::BuildSymbolTable { file: source(&file) }).await?;
    let count = offloaded.value.as_object().map(|o| o.len()).unwrap_or(0);
    Ok(json!({
        "filename": file.rel,
        "symbol_count": count,
        "symbols": offloaded.value,
        "fallback": offloaded.fallback,
    }))
}

#[derive(Deserialize)]
struct FlowArgs {
    variable: String,
    filename: String,
}

async fn trace_data_flow(ctx: ToolContext, args: Value) -> ToolResult<Value> {
    let args: FlowArgs = parse_args("trace_data_flow", args)?;
    let file = load_file(ctx.workspace()?, &args.filename).await?;
    Language::from_path(&file.rel).require_code(&file.rel)?;
    let offloaded = ctx
        .services
        .workers
        .process_file(
            "trace_data_flow",
            json!({"path": &file.rel, "content": &file.content, "variable": args.variable}),
        )
        .await?;
    Ok(json!({
        "filename": file.rel,
        "flow": offloaded.value,
        "fallback": offloaded.fallback,
    }))
}

#[derive(Deserialize)]
struct DebugArgs {
    filename: String,
    error_message: Option<String>,
}

fn line_refs() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(?:line\s+|:)(\d{1,6})\b").ok())
        .as_ref()
}

fn identifiers() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]{2,}").ok())
        .as_ref()
}

/// Words common in error text that say nothing about the code.
const ERROR_NOISE: &[&str] = &[
    "error", "errors", "warning", "line", "column", "file", "undefined", "null", "not", "the",
    "and", "cannot", "can't", "could", "failed", "expected", "found", "type", "typeerror",
    "referenceerror", "syntaxerror", "exception", "traceback", "most", "recent", "call", "last",
    "read", "property", "properties", "function", "is", "of", "at", "in", "mismatched", "types",
];

/// Line numbers and identifiers mentioned in an error message.
fn error_clues(message: &str) -> (BTreeSet<usize>, Vec<String>) {
    let lines = line_refs()
        .map(|re| {
            re.captures_iter(message)
                .filter_map(|c| c.get(1)?.as_str().parse::<usize>().ok())
                .filter(|n| *n > 0)
                .collect()
        })
        .unwrap_or_default();
    let mut seen = BTreeSet::new();
    let idents = identifiers()
        .map(|re| {
            re.find_iter(message)
                .map(|m| m.as_str().to_string())
                .filter(|w| !ERROR_NOISE.contains(&w.to_lowercase().as_str()))
                .filter(|w| seen.insert(w.clone()))
                .take(10)
                .collect()
        })
        .unwrap_or_default();
    (lines, idents)
}

async fn debug_systematically(ctx: ToolContext, args: Value) -> ToolResult<Value> {
    let args: DebugArgs = parse_args("debug_systematically", args)?;
    let file = load_file(ctx.workspace()?, &args.filename).await?;

    let mut results = ctx
        .services
        .workers
        .execute_batch(vec![
            WorkerTask::ValidateSyntax {
                file: source(&file),
                language: None,
            },
            WorkerTask::QualityMetrics { file: source(&file) },
        ])
        .await
        .into_iter();
    let validation = results
        .next()
        .ok_or_else(|| ToolError::Internal("Missing validation result".into()))??;
    let fallback = validation.fallback;
    let report: ValidationReport = decode(validation.value)?;
    // Quality needs a code language; plain text still gets the other checks.
    let quality: Option<QualityReport> = match results.next() {
        Some(Ok(q)) => Some(decode(q.value)?),
        _ => None,
    };

    let lines: Vec<&str> = file.content.lines().collect();
    let (line_numbers, idents) = args
        .error_message
        .as_deref()
        .map(error_clues)
        .unwrap_or_default();

    let referenced: Vec<Value> = line_numbers
        .iter()
        .filter(|n| **n <= lines.len())
        .map(|n| {
            let lo = n.saturating_sub(3).max(1);
            let hi = (n + 2).min(lines.len());
            json!({"line": n, "context": number_lines(lines[lo - 1..hi].iter().copied(), lo)})
        })
        .collect();

    let mut related = Vec::new();
    for ident in &idents {
        for (idx, line) in lines.iter().enumerate() {
            if line.contains(ident.as_str()) {
                related.push(json!({"identifier": ident, "line": idx + 1, "text": line.trim()}));
                if related.len() >= 50 {
                    break;
                }
            }
        }
    }

    let hotspots: Vec<Value> = quality
        .as_ref()
        .map(|q| {
            let mut fns = q.metrics.functions.clone();
            fns.sort_by(|a, b| b.complexity.cmp(&a.complexity));
            fns.into_iter()
                .take(5)
                .filter(|f| f.complexity > 1)
                .map(|f| json!({"name": f.name, "start_line": f.start_line, "end_line": f.end_line, "complexity": f.complexity}))
                .collect()
        })
        .unwrap_or_default();

    let mut hypotheses = Vec::new();
    if !report.valid {
        hypotheses.push(format!(
            "The file does not parse: fix the syntax issue(s) first:\n{}",
            report.summary()
        ));
    }
    for n in &line_numbers {
        if let Some(text) = n.checked_sub(1).and_then(|i| lines.get(i)) {
            hypotheses.push(format!("The error points at line {}: `{}`", n, text.trim()));
        }
    }
    if !related.is_empty() {
        hypotheses.push(format!(
            "Inspect how {} is defined and used; {} related line(s) found.",
            idents.join(", "),
            related.len()
        ));
    }
    if let Some(top) = hotspots.first() {
        hypotheses.push(format!(
            "The most complex function is {} (complexity {}); branch-heavy code is a common source of bugs.",
            top["name"].as_str().unwrap_or("?"),
            top["complexity"]
        ));
    }
    hypotheses.push(
        "Reproduce the failure, trace the data flow of the failing value with trace_data_flow, then make a surgical apply_diff fix and re-validate."
            .to_string(),
    );

    Ok(json!({
        "filename": file.rel,
        "syntax": to_payload(&report)?,
        "referenced_lines": referenced,
        "related_lines": related,
        "hotspots": hotspots,
        "quality_score": quality.as_ref().map(|q| q.score),
        "hypotheses": hypotheses,
        "fallback": fallback,
    }))
}

async fn analyze_code_quality(ctx: ToolContext, args: Value) -> ToolResult<Value> {
    let args: FileArgs = parse_args("analyze_code_quality", args)?;
    let file = load_file(ctx.workspace()?, &args.filename).await?;
    let offloaded = offload(&ctx, WorkerTask::QualityMetrics { file: source(&file) }).await?;
    let mut payload = offloaded.value;
    if let Some(obj) = payload.as_object_mut() {
        obj.insert("filename".into(), json!(file.rel));
        obj.insert("fallback".into(), json!(offloaded.fallback));
    }
    Ok(payload)
}

#[derive(Deserialize)]
struct ProblemArgs {
    problem: String,
}

async fn solve_engineering_problem(ctx: ToolContext, args: Value) -> ToolResult<Value> {
    let args: ProblemArgs = parse_args("solve_engineering_problem", args)?;
    let keywords = concept_tokens(&args.problem);
    if keywords.is_empty() {
        return Err(ToolError::BadRequest(
            "Describe the problem with at least one meaningful keyword".to_string(),
        ));
    }
    let index = ensure_index(&ctx, ctx.workspace()?).await?;

    let mut scored: Vec<(usize, &str, Vec<String>)> = index
        .files
        .values()
        .filter_map(|record| {
            let path = record.path.to_lowercase();
            let content = record.content.to_lowercase();
            let mut score = 0;
            let mut matched = Vec::new();
            for kw in &keywords {
                let mut hit = false;
                if path.contains(kw.as_str()) {
                    score += 2;
                    hit = true;
                }
                let defs = record
                    .definitions
                    .iter()
                    .filter(|d| d.label().to_lowercase().contains(kw.as_str()))
                    .count();
                if defs > 0 {
                    score += 3 * defs.min(3);
                    hit = true;
                }
                let occurrences = content.matches(kw.as_str()).count();
                if occurrences > 0 {
                    score += occurrences.min(5);
                    hit = true;
                }
                if hit {
                    matched.push(kw.clone());
                }
            }
            (score > 0).then_some((score, record.path.as_str(), matched))
        })
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(b.1)));
    scored.truncate(RELEVANT_FILES);

    let files: Vec<Value> = scored
        .iter()
        .map(|(score, path, matched)| json!({"file": path, "score": score, "keywords": matched}))
        .collect();
    let top: Vec<&str> = scored.iter().take(3).map(|(_, p, _)| *p).collect();

    let mut steps = Vec::new();
    if top.is_empty() {
        steps.push(format!(
            "No indexed file mentions {}; use search_code or get_project_structure to locate the relevant area.",
            keywords.join(", ")
        ));
    } else {
        steps.push(format!(
            "Read {} with include_line_numbers to understand the current behavior.",
            top.join(", ")
        ));
        steps.push(format!(
            "Use analyze_symbol on the key identifiers ({}) to find every definition and caller.",
            keywords.iter().take(3).cloned().collect::<Vec<_>>().join(", ")
        ));
    }
    steps.push("Write down the expected behavior and the smallest change that produces it.".to_string());
    steps.push("Apply the change with apply_diff, one block per location.".to_string());
    steps.push("Run validate_syntax on every touched file and review with analyze_code_quality.".to_string());

    Ok(json!({
        "problem": args.problem,
        "keywords": keywords,
        "relevant_files": files,
        "steps": steps,
    }))
}

async fn get_engineering_insights(ctx: ToolContext, _args: Value) -> ToolResult<Value> {
    let index = ensure_index(&ctx, ctx.workspace()?).await?;

    let mut languages: BTreeMap<&str, usize> = BTreeMap::new();
    let mut definitions: BTreeMap<&str, usize> = BTreeMap::new();
    let mut total_lines = 0;
    for record in index.files.values() {
        *languages.entry(Language::from_path(&record.path).as_str()).or_default() += 1;
        for def in &record.definitions {
            *definitions.entry(def.kind.as_str()).or_default() += 1;
        }
        total_lines += record.content.lines().count();
    }

    let mut largest: Vec<(&str, u64)> = index
        .files
        .values()
        .map(|r| (r.path.as_str(), r.size))
        .collect();
    largest.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    largest.truncate(LARGEST_FILES);

    Ok(json!({
        "total_files": index.len(),
        "total_lines": total_lines,
        "files_per_language": languages,
        "definitions": definitions,
        "todo_count": todo_count(&index),
        "largest_files": largest
            .iter()
            .map(|(path, size)| json!({"file": path, "size": size}))
            .collect::<Vec<_>>(),
    }))
}

async fn optimize_code_architecture(ctx: ToolContext, args: Value) -> ToolResult<Value> {
    let args: FileArgs = parse_args("optimize_code_architecture", args)?;
    let file = load_file(ctx.workspace()?, &args.filename).await?;
    let offloaded = offload(&ctx, WorkerTask::QualityMetrics { file: source(&file) }).await?;
    let report: QualityReport = decode(offloaded.value)?;
    let suggestions = architecture_suggestions(&report);
    Ok(json!({
        "filename": file.rel,
        "score": report.score,
        "grade": report.grade,
        "suggestions": suggestions,
        "fallback": offloaded.fallback,
    }))
}

#[derive(Deserialize)]
struct SectionArgs {
    filename: String,
    start_line: usize,
    end_line: usize,
}

async fn explain_code_section(ctx: ToolContext, args: Value) -> ToolResult<Value> {
    let args: SectionArgs = parse_args("explain_code_section", args)?;
    let file = load_file(ctx.workspace()?, &args.filename).await?;
    let lines: Vec<&str> = file.content.lines().collect();
    let (start, end) = (args.start_line, args.end_line);
    if start < 1 || end < start || end > lines.len() {
        return Err(ToolError::BadRequest(format!(
            "Invalid line range {}-{}: {} has {} lines",
            start,
            end,
            file.rel,
            lines.len()
        )));
    }

    let offloaded = ctx
        .services
        .workers
        .parse_ast(file.content.clone(), file.rel.clone(), true)
        .await?;
    let outline: AstOutline = decode(offloaded.value)?;
    let section = lines[start - 1..end].join("\n");
    let symbols: Vec<Value> = outline
        .symbols
        .iter()
        .filter(|s| s.start_line <= end && s.end_line >= start)
        .map(|s| {
            json!({
                "kind": s.kind,
                "name": s.name,
                "start_line": s.start_line,
                "end_line": s.end_line,
                "fully_inside": s.start_line >= start && s.end_line <= end,
            })
        })
        .collect();
    let complexity = complexity_of(&section);

    let summary = format!(
        "Lines {}-{} of {} ({}): {} line(s), {} symbol(s), complexity {}.",
        start,
        end,
        file.rel,
        outline.language,
        end - start + 1,
        symbols.len(),
        complexity
    );
    Ok(json!({
        "filename": file.rel,
        "summary": summary,
        "code": number_lines(lines[start - 1..end].iter().copied(), start),
        "symbols": symbols,
        "complexity": complexity,
        "fallback": offloaded.fallback,
    }))
}

#[derive(Deserialize)]
struct BatchArgs {
    filenames: Vec<String>,
}

/// Load every file, run `make_task` on the ones that loaded, and report
/// per-file outcomes in input order.
async fn run_batch(
    ctx: &ToolContext,
    tool: &str,
    args: Value,
    make_task: fn(SourceFile) -> WorkerTask,
) -> ToolResult<Value> {
    let args: BatchArgs = parse_args(tool, args)?;
    if args.filenames.is_empty() {
        return Err(ToolError::BadRequest("filenames must not be empty".to_string()));
    }
    if args.filenames.len() > MAX_BATCH_FILES {
        return Err(ToolError::BadRequest(format!(
            "At most {} files per batch",
            MAX_BATCH_FILES
        )));
    }
    let ws = ctx.workspace()?;

    let mut loaded = Vec::with_capacity(args.filenames.len());
    let mut tasks = Vec::new();
    for name in &args.filenames {
        match load_file(ws, name).await {
            Ok(file) => {
                tasks.push(make_task(source(&file)));
                loaded.push(Ok(file.rel));
            }
            Err(e) => loaded.push(Err(e)),
        }
    }

    let mut outcomes = ctx.services.workers.execute_batch(tasks).await.into_iter();
    let mut entries = Vec::with_capacity(loaded.len());
    let mut failed = 0;
    let mut fallback = false;
    for (name, load) in args.filenames.iter().zip(loaded) {
        let result = load.and_then(|rel| {
            outcomes
                .next()
                .unwrap_or_else(|| Err(ToolError::Internal("Missing batch result".into())))
                .map(|o| (rel, o))
        });
        let (filename, mut entry) = match result {
            Ok((rel, offloaded)) => {
                fallback |= offloaded.fallback;
                (rel, batch_entry(Ok(offloaded.value)))
            }
            Err(e) => {
                failed += 1;
                (name.clone(), batch_entry(Err(e)))
            }
        };
        if let Some(obj) = entry.as_object_mut() {
            obj.insert("filename".into(), json!(filename));
        }
        entries.push(entry);
    }

    Ok(json!({
        "files": entries,
        "succeeded": args.filenames.len() - failed,
        "failed": failed,
        "fallback": fallback,
    }))
}

async fn batch_analyze_files(ctx: ToolContext, args: Value) -> ToolResult<Value> {
    run_batch(&ctx, "batch_analyze_files", args, |file| WorkerTask::QualityMetrics { file }).await
}

async fn batch_validate_files(ctx: ToolContext, args: Value) -> ToolResult<Value> {
    run_batch(&ctx, "batch_validate_files", args, |file| WorkerTask::ValidateSyntax {
        file,
        language: None,
    })
    .await
}

async fn clear_cache_for_file(ctx: ToolContext, args: Value) -> ToolResult<Value> {
    let args: FileArgs = parse_args("clear_cache_for_file", args)?;
    let path = match &ctx.workspace {
        Some(ws) => ws.normalize(&args.filename)?,
        None => args.filename.trim().to_string(),
    };
    let results = ctx.services.cache.invalidate_path(&path);
    let validations = ctx.services.validator.invalidate_path(&path);
    Ok(json!({
        "filename": path,
        "cleared_results": results,
        "cleared_validations": validations,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_clues() {
        let (lines, idents) = error_clues(
            "TypeError: Cannot read properties of undefined (reading 'userName') at line 42\n  at src/app.js:17:5",
        );
        assert!(lines.contains(&42));
        assert!(lines.contains(&17));
        assert!(idents.contains(&"userName".to_string()));
        assert!(!idents.iter().any(|i| i.eq_ignore_ascii_case("cannot")));
    }
}
