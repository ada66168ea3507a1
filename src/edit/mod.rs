//! File mutations: create/delete/rename, full rewrite, SEARCH/REPLACE
//! diffs, line edits, append and undo.
//!
//! Every mutation runs the same pipeline: probe write permission, read the
//! current state, compute new content, validate it (warnings only), restore
//! the original line endings, push an undo snapshot, write, and notify the
//! editor.

pub mod diff;
pub mod endings;
pub mod lines;
pub mod streaming;
pub mod undo;

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::analysis::SyntaxValidator;
use crate::config::EditConfig;
use crate::editor::EditorHost;
use crate::error::{ToolError, ToolResult};
use crate::workspace::{scanner, Workspace};

pub use diff::{apply_blocks, parse_diff, BlockOutcome, MatchStrategy};
pub use endings::LineEnding;
pub use lines::{apply_line_edits, LineEdit};
pub use undo::{Snapshot, UndoEntry, UndoStack};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditOutcome {
    pub message: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_path: Option<String>,
    pub method: String,
    pub lines_affected: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<BlockOutcome>,
}

impl EditOutcome {
    fn new(path: &str, method: &str, summary: String) -> Self {
        Self {
            message: summary,
            path: path.to_string(),
            previous_path: None,
            method: method.to_string(),
            lines_affected: 0,
            warnings: Vec::new(),
            blocks: Vec::new(),
        }
    }

    fn finish(mut self) -> Self {
        if !self.warnings.is_empty() {
            self.message = format!("{}\n\nWarnings:\n- {}", self.message, self.warnings.join("\n- "));
        }
        self
    }
}

/// Read a UTF-8 file, mapping I/O failures to tool errors.
pub async fn read_text(abs: &Path, display: &str) -> ToolResult<String> {
    let bytes = tokio::fs::read(abs)
        .await
        .map_err(|e| ToolError::from_io(e, display))?;
    String::from_utf8(bytes)
        .map_err(|_| ToolError::Unsupported(format!("{} is not valid UTF-8 text", display)))
}

fn count_lines(content: &str) -> usize {
    lines::line_count(&lines::split_lines(content))
}

fn slash_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Ancestors of `target` (inside the workspace) that do not exist yet,
/// deepest first.
fn missing_parents(target: &Target) -> Vec<String> {
    let rel = Path::new(&target.rel);
    rel.ancestors()
        .skip(1)
        .zip(target.abs.ancestors().skip(1))
        .take_while(|(rel_dir, abs_dir)| !rel_dir.as_os_str().is_empty() && !abs_dir.exists())
        .map(|(rel_dir, _)| slash_path(rel_dir))
        .collect()
}

type TreeContents = (Vec<String>, Vec<(String, Vec<u8>)>);

/// Read every file and list every subfolder of `root`. Any unreadable entry
/// fails the snapshot.
fn snapshot_tree(
    root: &Path,
    label: &str,
    read: impl Fn(&Path) -> std::io::Result<Vec<u8>>,
) -> ToolResult<TreeContents> {
    let tree = scanner::walk_tree(root)
        .map_err(|e| ToolError::Internal(format!("Cannot snapshot {}: {}", label, e)))?;
    let relative = |path: &Path| -> ToolResult<String> {
        path.strip_prefix(root)
            .map(slash_path)
            .map_err(|_| ToolError::Internal(format!("{} escaped {}", path.display(), label)))
    };

    let mut dirs = tree
        .dirs
        .iter()
        .map(|d| relative(d))
        .collect::<ToolResult<Vec<_>>>()?;
    dirs.sort();
    let mut files = Vec::with_capacity(tree.files.len());
    for file in &tree.files {
        let rel = relative(file)?;
        let bytes = read(file).map_err(|e| ToolError::from_io(e, &format!("{}/{}", label, rel)))?;
        files.push((rel, bytes));
    }
    Ok((dirs, files))
}

struct Target {
    rel: String,
    abs: PathBuf,
}

pub struct EditEngine {
    undo: Arc<UndoStack>,
    validator: Arc<SyntaxValidator>,
    editor: Arc<dyn EditorHost>,
    config: EditConfig,
}

impl EditEngine {
    pub fn new(
        undo: Arc<UndoStack>,
        validator: Arc<SyntaxValidator>,
        editor: Arc<dyn EditorHost>,
        config: EditConfig,
    ) -> Self {
        Self {
            undo,
            validator,
            editor,
            config,
        }
    }

    pub fn undo_stack(&self) -> &UndoStack {
        &self.undo
    }

    fn target(&self, ws: &Workspace, raw: &str) -> ToolResult<Target> {
        let rel = ws.normalize(raw)?;
        let abs = ws.root().join(&rel);
        Ok(Target { rel, abs })
    }

    /// Permission probe. Only user-activation failures stop the write.
    fn probe(&self, ws: &Workspace, target: &Target, warnings: &mut Vec<String>) -> ToolResult<()> {
        match ws.probe_write(&target.abs) {
            Ok(()) => Ok(()),
            Err(e) if e.needs_user_activation() => Err(e),
            Err(e) => {
                warn!(path = %target.rel, "write probe failed, proceeding: {}", e);
                warnings.push(format!("Permission probe failed ({}); attempted the write anyway", e));
                Ok(())
            }
        }
    }

    async fn ensure_parent(&self, target: &Target) -> ToolResult<()> {
        if let Some(parent) = target.abs.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::from_io(e, &target.rel))?;
        }
        Ok(())
    }

    async fn read_existing(&self, target: &Target) -> ToolResult<Option<Vec<u8>>> {
        match tokio::fs::metadata(&target.abs).await {
            Ok(meta) if meta.is_dir() => Err(ToolError::BadRequest(format!(
                "{} is a folder, not a file",
                target.rel
            ))),
            Ok(_) => tokio::fs::read(&target.abs)
                .await
                .map(Some)
                .map_err(|e| ToolError::from_io(e, &target.rel)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ToolError::from_io(e, &target.rel)),
        }
    }

    async fn read_required(&self, target: &Target) -> ToolResult<(Vec<u8>, String)> {
        let bytes = self
            .read_existing(target)
            .await?
            .ok_or_else(|| ToolError::NotFound(format!("File not found: {}", target.rel)))?;
        let text = String::from_utf8(bytes.clone())
            .map_err(|_| ToolError::Unsupported(format!("{} is not valid UTF-8 text", target.rel)))?;
        Ok((bytes, text))
    }

    /// Validate, restore line endings, snapshot, write and notify.
    #[allow(clippy::too_many_arguments)]
    async fn commit(
        &self,
        target: &Target,
        previous: Option<Vec<u8>>,
        new_content: &str,
        ending: LineEnding,
        tool: &str,
        streaming: bool,
        warnings: &mut Vec<String>,
    ) -> ToolResult<()> {
        let report = self.validator.validate(&target.rel, new_content);
        if !report.valid {
            warnings.push(format!(
                "Syntax validation ({}) reported issues; the file was still written:\n{}",
                report.checker,
                report.summary()
            ));
        }

        let final_content = ending.apply(new_content);
        let snapshot = match previous {
            Some(bytes) => Snapshot::File { bytes },
            None => Snapshot::Absent {
                dir: false,
                created_parents: missing_parents(target),
            },
        };
        self.undo.push(UndoEntry::new(&target.rel, snapshot, tool));

        self.ensure_parent(target).await?;
        let big = final_content.len() as u64 > self.config.streaming_threshold;
        if streaming || big {
            let chunks = streaming::write_chunked(
                &target.abs,
                &target.rel,
                final_content.as_bytes(),
                self.config.write_chunk_size,
                self.config.yield_every_chunks,
            )
            .await;
            if let Err(e) = chunks {
                self.undo.pop();
                return Err(e);
            }
        } else if let Err(e) = tokio::fs::write(&target.abs, final_content.as_bytes()).await {
            self.undo.pop();
            return Err(ToolError::from_io(e, &target.rel));
        }

        if self.editor.is_open(&target.rel) {
            self.editor.update_buffer(&target.rel, &final_content);
        }
        self.editor.note_touched(&target.rel);
        debug!(path = %target.rel, bytes = final_content.len(), tool, "file written");
        Ok(())
    }

    pub async fn create_file(&self, ws: &Workspace, filename: &str, content: &str) -> ToolResult<EditOutcome> {
        let target = self.target(ws, filename)?;
        let mut warnings = Vec::new();
        self.probe(ws, &target, &mut warnings)?;

        if self.read_existing(&target).await?.is_some() {
            return Err(ToolError::Conflict(format!(
                "{} already exists; use edit_file or apply_diff to change it",
                target.rel
            )));
        }
        let ending = LineEnding::detect(content);
        self.commit(&target, None, content, ending, "create_file", false, &mut warnings)
            .await?;

        let mut outcome = EditOutcome::new(
            &target.rel,
            "create",
            format!("Created {} ({} lines)", target.rel, count_lines(content)),
        );
        outcome.lines_affected = count_lines(content);
        outcome.warnings = warnings;
        Ok(outcome.finish())
    }

    pub async fn rewrite(&self, ws: &Workspace, filename: &str, content: &str) -> ToolResult<EditOutcome> {
        let target = self.target(ws, filename)?;
        let mut warnings = Vec::new();
        self.probe(ws, &target, &mut warnings)?;

        if content.len() > self.config.large_rewrite_warning {
            warn!(path = %target.rel, bytes = content.len(), "large full-file rewrite");
            warnings.push(format!(
                "Rewriting {} bytes; prefer apply_diff or line edits for large files",
                content.len()
            ));
        }

        let previous = self.read_existing(&target).await?;
        let old_lines = previous
            .as_ref()
            .map(|b| count_lines(&String::from_utf8_lossy(b)))
            .unwrap_or(0);
        let ending = match &previous {
            Some(bytes) => LineEnding::detect(&String::from_utf8_lossy(bytes)),
            None => LineEnding::detect(content),
        };
        self.commit(&target, previous, content, ending, "edit_file", false, &mut warnings)
            .await?;

        let new_lines = count_lines(content);
        let mut outcome = EditOutcome::new(
            &target.rel,
            "rewrite",
            format!("Rewrote {} ({} -> {} lines)", target.rel, old_lines, new_lines),
        );
        outcome.lines_affected = old_lines.max(new_lines);
        outcome.warnings = warnings;
        Ok(outcome.finish())
    }

    pub async fn apply_diff(&self, ws: &Workspace, filename: &str, diff_text: &str) -> ToolResult<EditOutcome> {
        let blocks = parse_diff(diff_text)?;
        let target = self.target(ws, filename)?;
        let mut warnings = Vec::new();
        self.probe(ws, &target, &mut warnings)?;

        let (bytes, text) = self.read_required(&target).await?;
        let ending = LineEnding::detect(&text);
        let applied = apply_blocks(&endings::normalize(&text), &blocks)?;

        if applied.used_fuzzy_match() {
            for block in applied.blocks.iter().filter(|b| b.strategy != MatchStrategy::Exact) {
                warnings.push(format!(
                    "Block for line {} matched at line {} using {:?} matching; re-read the file to confirm the result",
                    block.start_line, block.matched_line, block.strategy
                ));
            }
        }

        self.commit(&target, Some(bytes), &applied.content, ending, "apply_diff", false, &mut warnings)
            .await?;

        let mut outcome = EditOutcome::new(
            &target.rel,
            "apply_diff",
            format!(
                "Applied {} diff block(s) to {}",
                applied.blocks.len(),
                target.rel
            ),
        );
        outcome.lines_affected = applied.lines_affected();
        outcome.blocks = applied.blocks;
        outcome.warnings = warnings;
        Ok(outcome.finish())
    }

    pub async fn edit_lines(&self, ws: &Workspace, filename: &str, edits: &[LineEdit]) -> ToolResult<EditOutcome> {
        let target = self.target(ws, filename)?;
        let mut warnings = Vec::new();
        self.probe(ws, &target, &mut warnings)?;

        let size = match tokio::fs::metadata(&target.abs).await {
            Ok(meta) => meta.len(),
            Err(e) => return Err(ToolError::from_io(e, &target.rel)),
        };
        let streaming = size > self.config.streaming_threshold;

        let (original, lines, ending) = if streaming {
            info!(path = %target.rel, size, "using streaming line edit");
            let file = streaming::read_lines_chunked(
                &target.abs,
                &target.rel,
                self.config.read_chunk_size,
                self.config.yield_every_chunks,
            )
            .await?;
            (file.original, file.lines, file.ending)
        } else {
            let (bytes, text) = self.read_required(&target).await?;
            let ending = LineEnding::detect(&text);
            (bytes, lines::split_lines(&endings::normalize(&text)), ending)
        };

        let applied = apply_line_edits(lines, edits)?;
        warnings.extend(applied.warnings);
        let content = applied.lines.join("\n");
        self.commit(&target, Some(original), &content, ending, "edit_file", streaming, &mut warnings)
            .await?;

        let method = if streaming { "streaming_line_edit" } else { "line_edit" };
        let mut outcome = EditOutcome::new(
            &target.rel,
            method,
            format!("Applied {} line edit(s) to {}", edits.len(), target.rel),
        );
        outcome.lines_affected = applied.lines_affected;
        outcome.warnings = warnings;
        Ok(outcome.finish())
    }

    pub async fn append(&self, ws: &Workspace, filename: &str, content: &str) -> ToolResult<EditOutcome> {
        let target = self.target(ws, filename)?;
        let mut warnings = Vec::new();
        self.probe(ws, &target, &mut warnings)?;

        let previous = self.read_existing(&target).await?;
        let existing = match &previous {
            Some(bytes) => String::from_utf8(bytes.clone()).map_err(|_| {
                ToolError::Unsupported(format!("{} is not valid UTF-8 text", target.rel))
            })?,
            None => String::new(),
        };
        let ending = LineEnding::detect(&existing);
        let existing = endings::normalize(&existing);
        let new_content = if existing.is_empty() {
            content.to_string()
        } else {
            format!("{}\n{}", existing, content)
        };
        let created = previous.is_none();
        self.commit(&target, previous, &new_content, ending, "append_to_file", false, &mut warnings)
            .await?;

        let added = count_lines(content);
        let mut outcome = EditOutcome::new(
            &target.rel,
            "append",
            if created {
                format!("Created {} and appended {} lines", target.rel, added)
            } else {
                format!("Appended {} lines to {}", added, target.rel)
            },
        );
        outcome.lines_affected = added;
        outcome.warnings = warnings;
        Ok(outcome.finish())
    }

    pub async fn delete_file(&self, ws: &Workspace, filename: &str) -> ToolResult<EditOutcome> {
        let target = self.target(ws, filename)?;
        let mut warnings = Vec::new();
        self.probe(ws, &target, &mut warnings)?;

        let bytes = self
            .read_existing(&target)
            .await?
            .ok_or_else(|| ToolError::NotFound(format!("File not found: {}", target.rel)))?;
        let lines = count_lines(&String::from_utf8_lossy(&bytes));
        tokio::fs::remove_file(&target.abs)
            .await
            .map_err(|e| ToolError::from_io(e, &target.rel))?;
        self.undo
            .push(UndoEntry::new(&target.rel, Snapshot::File { bytes }, "delete_file"));
        self.validator.invalidate_path(&target.rel);
        self.editor.note_touched(&target.rel);

        let mut outcome = EditOutcome::new(&target.rel, "delete", format!("Deleted {}", target.rel));
        outcome.lines_affected = lines;
        outcome.warnings = warnings;
        Ok(outcome.finish())
    }

    async fn rename(
        &self,
        ws: &Workspace,
        old: &str,
        new: &str,
        want_dir: bool,
        tool: &str,
    ) -> ToolResult<EditOutcome> {
        let from = self.target(ws, old)?;
        let to = self.target(ws, new)?;
        let mut warnings = Vec::new();
        self.probe(ws, &from, &mut warnings)?;
        self.probe(ws, &to, &mut warnings)?;

        let kind = if want_dir { "Folder" } else { "File" };
        match tokio::fs::metadata(&from.abs).await {
            Ok(meta) if meta.is_dir() != want_dir => {
                return Err(ToolError::BadRequest(format!(
                    "{} is not a {}",
                    from.rel,
                    kind.to_lowercase()
                )))
            }
            Ok(_) => {}
            Err(_) => return Err(ToolError::NotFound(format!("{} not found: {}", kind, from.rel))),
        }
        if tokio::fs::metadata(&to.abs).await.is_ok() {
            return Err(ToolError::Conflict(format!("Destination already exists: {}", to.rel)));
        }

        self.ensure_parent(&to).await?;
        tokio::fs::rename(&from.abs, &to.abs)
            .await
            .map_err(|e| ToolError::from_io(e, &from.rel))?;
        self.undo.push(UndoEntry::new(
            &from.rel,
            Snapshot::Renamed {
                from: from.rel.clone(),
                to: to.rel.clone(),
            },
            tool,
        ));
        self.validator.invalidate_path(&from.rel);
        self.editor.note_touched(&to.rel);

        let mut outcome = EditOutcome::new(
            &to.rel,
            "rename",
            format!("Renamed {} to {}", from.rel, to.rel),
        );
        outcome.previous_path = Some(from.rel);
        outcome.warnings = warnings;
        Ok(outcome.finish())
    }

    pub async fn rename_file(&self, ws: &Workspace, old: &str, new: &str) -> ToolResult<EditOutcome> {
        self.rename(ws, old, new, false, "rename_file").await
    }

    pub async fn rename_folder(&self, ws: &Workspace, old: &str, new: &str) -> ToolResult<EditOutcome> {
        self.rename(ws, old, new, true, "rename_folder").await
    }

    pub async fn create_folder(&self, ws: &Workspace, path: &str) -> ToolResult<EditOutcome> {
        let target = self.target(ws, path)?;
        let mut warnings = Vec::new();
        self.probe(ws, &target, &mut warnings)?;

        if tokio::fs::metadata(&target.abs).await.is_ok() {
            return Err(ToolError::Conflict(format!("Path already exists: {}", target.rel)));
        }
        let created_parents = missing_parents(&target);
        tokio::fs::create_dir_all(&target.abs)
            .await
            .map_err(|e| ToolError::from_io(e, &target.rel))?;
        self.undo.push(UndoEntry::new(
            &target.rel,
            Snapshot::Absent {
                dir: true,
                created_parents,
            },
            "create_folder",
        ));

        let mut outcome = EditOutcome::new(
            &target.rel,
            "create_folder",
            format!("Created folder {}", target.rel),
        );
        outcome.warnings = warnings;
        Ok(outcome.finish())
    }

    pub async fn delete_folder(&self, ws: &Workspace, path: &str) -> ToolResult<EditOutcome> {
        let target = self.target(ws, path)?;
        let mut warnings = Vec::new();
        self.probe(ws, &target, &mut warnings)?;

        match tokio::fs::metadata(&target.abs).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(ToolError::BadRequest(format!(
                    "{} is a file; use delete_file",
                    target.rel
                )))
            }
            Err(_) => return Err(ToolError::NotFound(format!("Folder not found: {}", target.rel))),
        }

        let root = target.abs.clone();
        let label = target.rel.clone();
        let (dirs, files) =
            tokio::task::spawn_blocking(move || snapshot_tree(&root, &label, |p| std::fs::read(p)))
                .await
                .map_err(|e| ToolError::Internal(format!("Folder snapshot failed: {}", e)))??;
        let count = files.len();

        tokio::fs::remove_dir_all(&target.abs)
            .await
            .map_err(|e| ToolError::from_io(e, &target.rel))?;
        self.undo
            .push(UndoEntry::new(&target.rel, Snapshot::Tree { dirs, files }, "delete_folder"));

        let mut outcome = EditOutcome::new(
            &target.rel,
            "delete_folder",
            format!("Deleted folder {} ({} files)", target.rel, count),
        );
        outcome.warnings = warnings;
        Ok(outcome.finish())
    }

    /// Remove folders an undone creation had to make. Stops at the first
    /// one that is no longer empty.
    async fn remove_created_parents(&self, ws: &Workspace, parents: &[String]) {
        for rel in parents {
            if let Err(e) = tokio::fs::remove_dir(ws.root().join(rel)).await {
                debug!(path = %rel, "kept parent folder on undo: {}", e);
                break;
            }
        }
    }

    /// Revert the most recent mutation.
    pub async fn undo_last_change(&self, ws: &Workspace) -> ToolResult<EditOutcome> {
        let entry = self
            .undo
            .pop()
            .ok_or_else(|| ToolError::BadRequest("Nothing to undo".to_string()))?;
        let target = self.target(ws, &entry.path)?;
        let described = entry.snapshot.describe();

        let restored = match &entry.snapshot {
            Snapshot::File { bytes } => {
                self.ensure_parent(&target).await?;
                tokio::fs::write(&target.abs, bytes).await.map(|_| target.rel.clone())
            }
            Snapshot::Absent { dir, created_parents } => {
                let removed = if *dir {
                    tokio::fs::remove_dir_all(&target.abs).await
                } else {
                    tokio::fs::remove_file(&target.abs).await
                };
                let removed = match removed {
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                    other => other,
                };
                if removed.is_ok() {
                    self.remove_created_parents(ws, created_parents).await;
                }
                removed.map(|_| target.rel.clone())
            }
            Snapshot::Renamed { from, to } => {
                let from = self.target(ws, from)?;
                let to = self.target(ws, to)?;
                self.ensure_parent(&from).await?;
                tokio::fs::rename(&to.abs, &from.abs).await.map(|_| from.rel.clone())
            }
            Snapshot::Tree { dirs, files } => {
                let mut result = tokio::fs::create_dir_all(&target.abs).await;
                for rel in dirs {
                    if result.is_err() {
                        break;
                    }
                    result = tokio::fs::create_dir_all(target.abs.join(rel)).await;
                }
                for (rel, bytes) in files {
                    if result.is_err() {
                        break;
                    }
                    let path = target.abs.join(rel);
                    if let Some(parent) = path.parent() {
                        result = tokio::fs::create_dir_all(parent).await;
                    }
                    if result.is_ok() {
                        result = tokio::fs::write(&path, bytes).await;
                    }
                }
                result.map(|_| target.rel.clone())
            }
        };

        let restored = match restored {
            Ok(path) => path,
            Err(e) => {
                let err = ToolError::from_io(e, &entry.path);
                self.undo.push(entry);
                return Err(err);
            }
        };

        self.validator.invalidate_path(&entry.path);
        if let Snapshot::File { bytes } = &entry.snapshot {
            if self.editor.is_open(&restored) {
                self.editor
                    .update_buffer(&restored, &String::from_utf8_lossy(bytes));
            }
        }
        self.editor.note_touched(&restored);
        info!(path = %restored, tool = %entry.tool, "undid change");

        let mut outcome = EditOutcome::new(
            &restored,
            "undo",
            format!("Undid {} on {} (restored {})", entry.tool, entry.path, described),
        );
        if let Snapshot::Renamed { to, .. } = &entry.snapshot {
            outcome.previous_path = Some(to.clone());
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::editor::DetachedEditor;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Workspace, EditEngine) {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::new(dir.path().to_path_buf(), vec![]);
        let engine = engine_with(dir.path(), Config::default().edit);
        (dir, ws, engine)
    }

    fn engine_with(root: &Path, config: EditConfig) -> EditEngine {
        EditEngine::new(
            Arc::new(UndoStack::default()),
            Arc::new(SyntaxValidator::default()),
            Arc::new(DetachedEditor::new(root.to_path_buf())),
            config,
        )
    }

    fn read(dir: &TempDir, rel: &str) -> String {
        std::fs::read_to_string(dir.path().join(rel)).unwrap()
    }

    const DIFF_Y: &str = "<<<<<<< SEARCH\n:start_line:2\n-------\ny\n=======\nY\n>>>>>>> REPLACE";

    #[tokio::test]
    async fn test_create_then_read() {
        let (dir, ws, engine) = setup();
        let out = engine.create_file(&ws, "a.txt", "hello\n").await.unwrap();
        assert_eq!(out.method, "create");
        assert_eq!(read(&dir, "a.txt"), "hello\n");
        assert_eq!(read_text(&dir.path().join("a.txt"), "a.txt").await.unwrap(), "hello\n");
    }

    #[tokio::test]
    async fn test_apply_diff_then_undo() {
        let (dir, ws, engine) = setup();
        std::fs::write(dir.path().join("b.txt"), "x\ny\nz").unwrap();

        let out = engine.apply_diff(&ws, "b.txt", DIFF_Y).await.unwrap();
        assert_eq!(read(&dir, "b.txt"), "x\nY\nz");
        assert_eq!(out.blocks[0].strategy, MatchStrategy::Exact);

        engine.undo_last_change(&ws).await.unwrap();
        assert_eq!(read(&dir, "b.txt"), "x\ny\nz");
    }

    #[tokio::test]
    async fn test_diff_mismatch_leaves_file() {
        let (dir, ws, engine) = setup();
        std::fs::write(dir.path().join("b.txt"), "x\ny\nz").unwrap();
        let diff = "<<<<<<< SEARCH\n:start_line:2\n-------\nq\n=======\nQ\n>>>>>>> REPLACE";

        let err = engine.apply_diff(&ws, "b.txt", diff).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(err.message().contains(">>> 2: y"));
        assert_eq!(read(&dir, "b.txt"), "x\ny\nz");
        assert!(engine.undo_stack().is_empty());
    }

    #[tokio::test]
    async fn test_line_edit_conflict_leaves_file() {
        let (dir, ws, engine) = setup();
        std::fs::write(dir.path().join("c.txt"), "different\n").unwrap();
        let edits = vec![LineEdit::ReplaceLines {
            start_line: 1,
            end_line: 1,
            new_content: "new".into(),
            expected_content: Some("old".into()),
        }];

        let err = engine.edit_lines(&ws, "c.txt", &edits).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(read(&dir, "c.txt"), "different\n");
    }

    #[tokio::test]
    async fn test_crlf_is_preserved() {
        let (dir, ws, engine) = setup();
        std::fs::write(dir.path().join("w.txt"), "x\r\ny\r\nz\r\n").unwrap();
        engine.apply_diff(&ws, "w.txt", DIFF_Y).await.unwrap();
        assert_eq!(read(&dir, "w.txt"), "x\r\nY\r\nz\r\n");

        engine.undo_last_change(&ws).await.unwrap();
        assert_eq!(read(&dir, "w.txt"), "x\r\ny\r\nz\r\n");
    }

    #[tokio::test]
    async fn test_undo_round_trips_structural_ops() {
        let (dir, ws, engine) = setup();
        std::fs::create_dir_all(dir.path().join("lib/inner")).unwrap();
        std::fs::write(dir.path().join("lib/a.rs"), "fn a() {}\n").unwrap();
        std::fs::write(dir.path().join("lib/inner/b.rs"), "fn b() {}\n").unwrap();

        engine.rename_folder(&ws, "lib", "core").await.unwrap();
        assert!(dir.path().join("core/a.rs").exists());
        engine.undo_last_change(&ws).await.unwrap();
        assert!(dir.path().join("lib/a.rs").exists());

        engine.delete_folder(&ws, "lib").await.unwrap();
        assert!(!dir.path().join("lib").exists());
        engine.undo_last_change(&ws).await.unwrap();
        assert_eq!(read(&dir, "lib/inner/b.rs"), "fn b() {}\n");

        engine.create_file(&ws, "fresh.txt", "new").await.unwrap();
        engine.undo_last_change(&ws).await.unwrap();
        assert!(!dir.path().join("fresh.txt").exists());

        engine.delete_file(&ws, "lib/a.rs").await.unwrap();
        engine.undo_last_change(&ws).await.unwrap();
        assert_eq!(read(&dir, "lib/a.rs"), "fn a() {}\n");

        let err = engine.undo_last_change(&ws).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
    }

    #[tokio::test]
    async fn test_create_file_refuses_existing() {
        let (dir, ws, engine) = setup();
        std::fs::write(dir.path().join("a.txt"), "precious").unwrap();
        let err = engine.create_file(&ws, "a.txt", "new").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(read(&dir, "a.txt"), "precious");
        assert!(engine.undo_stack().is_empty());
    }

    #[tokio::test]
    async fn test_diff_keeps_lone_carriage_return() {
        let (dir, ws, engine) = setup();
        std::fs::write(dir.path().join("cr.txt"), "x\ny\nz\rtail\n").unwrap();
        let diff = "<<<<<<< SEARCH\n:start_line:1\n-------\nx\n=======\nX\n>>>>>>> REPLACE";
        engine.apply_diff(&ws, "cr.txt", diff).await.unwrap();
        assert_eq!(read(&dir, "cr.txt"), "X\ny\nz\rtail\n");

        engine.append(&ws, "cr.txt", "more").await.unwrap();
        assert_eq!(read(&dir, "cr.txt"), "X\ny\nz\rtail\n\nmore");
    }

    #[tokio::test]
    async fn test_undo_create_removes_new_parent_folders() {
        let (dir, ws, engine) = setup();
        std::fs::create_dir(dir.path().join("src")).unwrap();

        engine.create_file(&ws, "src/deep/er/new.rs", "fn f() {}\n").await.unwrap();
        engine.undo_last_change(&ws).await.unwrap();
        assert!(!dir.path().join("src/deep").exists());
        assert!(dir.path().join("src").is_dir());

        engine.append(&ws, "notes/today.md", "- item").await.unwrap();
        engine.undo_last_change(&ws).await.unwrap();
        assert!(!dir.path().join("notes").exists());

        engine.create_folder(&ws, "a/b/c").await.unwrap();
        engine.undo_last_change(&ws).await.unwrap();
        assert!(!dir.path().join("a").exists());
    }

    #[tokio::test]
    async fn test_undo_create_keeps_parent_that_gained_files() {
        let (dir, ws, engine) = setup();
        engine.create_file(&ws, "pkg/one.rs", "").await.unwrap();
        std::fs::write(dir.path().join("pkg/two.rs"), "").unwrap();
        engine.undo_last_change(&ws).await.unwrap();
        assert!(!dir.path().join("pkg/one.rs").exists());
        assert!(dir.path().join("pkg/two.rs").exists());
    }

    #[tokio::test]
    async fn test_delete_folder_restores_empty_subfolders() {
        let (dir, ws, engine) = setup();
        std::fs::create_dir_all(dir.path().join("lib/empty/nested")).unwrap();
        std::fs::write(dir.path().join("lib/a.rs"), "fn a() {}\n").unwrap();

        let out = engine.delete_folder(&ws, "lib").await.unwrap();
        assert!(out.message.contains("1 files"));
        engine.undo_last_change(&ws).await.unwrap();
        assert!(dir.path().join("lib/empty/nested").is_dir());
        assert_eq!(read(&dir, "lib/a.rs"), "fn a() {}\n");
    }

    #[test]
    fn test_unreadable_file_fails_folder_snapshot() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("lib")).unwrap();
        std::fs::write(dir.path().join("lib/a.rs"), "a").unwrap();
        std::fs::write(dir.path().join("lib/secret.rs"), "s").unwrap();

        let err = snapshot_tree(&dir.path().join("lib"), "lib", |p| {
            if p.ends_with("secret.rs") {
                Err(std::io::Error::from(std::io::ErrorKind::PermissionDenied))
            } else {
                std::fs::read(p)
            }
        })
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert!(err.message().contains("lib/secret.rs"));
    }

    #[tokio::test]
    async fn test_append_separator() {
        let (dir, ws, engine) = setup();
        engine.append(&ws, "log.txt", "first").await.unwrap();
        assert_eq!(read(&dir, "log.txt"), "first");
        engine.append(&ws, "log.txt", "second").await.unwrap();
        assert_eq!(read(&dir, "log.txt"), "first\nsecond");
    }

    #[tokio::test]
    async fn test_streaming_path_for_large_files() {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::new(dir.path().to_path_buf(), vec![]);
        let mut config = Config::default().edit;
        config.streaming_threshold = 16;
        config.read_chunk_size = 8;
        config.write_chunk_size = 8;
        let engine = engine_with(dir.path(), config);

        let content: String = (1..=20).map(|i| format!("line {}\n", i)).collect();
        std::fs::write(dir.path().join("big.txt"), &content).unwrap();
        let edits = vec![LineEdit::ReplaceLines {
            start_line: 10,
            end_line: 10,
            new_content: "TEN".into(),
            expected_content: Some("line 10".into()),
        }];

        let out = engine.edit_lines(&ws, "big.txt", &edits).await.unwrap();
        assert_eq!(out.method, "streaming_line_edit");
        let text = read(&dir, "big.txt");
        assert!(text.contains("line 9\nTEN\nline 11\n"));
        assert!(text.ends_with("line 20\n"));

        engine.undo_last_change(&ws).await.unwrap();
        assert_eq!(read(&dir, "big.txt"), content);
    }

    #[tokio::test]
    async fn test_validation_warns_but_writes() {
        let (dir, ws, engine) = setup();
        std::fs::write(dir.path().join("cfg.json"), "{}").unwrap();
        let out = engine.rewrite(&ws, "cfg.json", "{\"a\": }").await.unwrap();
        assert_eq!(read(&dir, "cfg.json"), "{\"a\": }");
        assert!(out.message.contains("Syntax validation"));
    }

    #[tokio::test]
    async fn test_rename_conflict_and_missing() {
        let (dir, ws, engine) = setup();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        let err = engine.rename_file(&ws, "a.txt", "b.txt").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        let err = engine.rename_file(&ws, "zzz.txt", "c.txt").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
