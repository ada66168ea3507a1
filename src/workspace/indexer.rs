//! Incremental code indexer.
//!
//! A pass walks the workspace, re-reads files whose mtime is newer than the
//! last pass (or that the index has never seen), and reaps records whose
//! files disappeared. Readers get an `Arc` snapshot; only passes swap it.

use chrono::Utc;
use std::collections::HashSet;
use std::fs;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::definitions::extract_definitions;
use super::index::{self, CodeIndex, DefinitionKind, FileRecord, IndexStats};
use super::scanner::{self, WalkEntry, MAX_INDEXED_FILE_SIZE};
use super::types::Workspace;
use crate::error::{ToolError, ToolResult};
use crate::store::ObjectStore;

/// Single hit from `query`.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct QueryHit {
    pub file: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub line: usize,
}

struct IndexState {
    index: Arc<CodeIndex>,
    last_timestamp: u64,
}

pub struct Indexer {
    store: Arc<dyn ObjectStore>,
    text_extensions: Arc<Vec<String>>,
    state: RwLock<IndexState>,
    /// Serializes passes so two writers never race on the snapshot.
    pass_lock: Mutex<()>,
}

impl Indexer {
    pub fn new(store: Arc<dyn ObjectStore>, text_extensions: Vec<String>) -> Self {
        Self {
            store,
            text_extensions: Arc::new(text_extensions),
            state: RwLock::new(IndexState {
                index: Arc::new(CodeIndex::default()),
                last_timestamp: 0,
            }),
            pass_lock: Mutex::new(()),
        }
    }

    /// Restore the persisted index, if any.
    pub fn load(&self) -> ToolResult<()> {
        let (loaded, timestamp) = index::load(self.store.as_ref())?;
        debug!("Loaded code index with {} files", loaded.len());
        self.swap(loaded, timestamp);
        Ok(())
    }

    pub fn snapshot(&self) -> Arc<CodeIndex> {
        match self.state.read() {
            Ok(state) => state.index.clone(),
            Err(poisoned) => poisoned.into_inner().index.clone(),
        }
    }

    pub fn last_timestamp(&self) -> u64 {
        match self.state.read() {
            Ok(state) => state.last_timestamp,
            Err(poisoned) => poisoned.into_inner().last_timestamp,
        }
    }

    fn swap(&self, index: CodeIndex, timestamp: u64) {
        let mut state = match self.state.write() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.index = Arc::new(index);
        state.last_timestamp = timestamp;
    }

    fn persist(&self, index: &CodeIndex, timestamp: u64) {
        if let Err(e) = index::save(self.store.as_ref(), index, timestamp) {
            warn!("Failed to persist code index: {:#}", e);
        }
    }

    /// Full incremental pass over the workspace.
    pub async fn build_or_update(&self, workspace: &Workspace) -> ToolResult<IndexStats> {
        let _guard = self.pass_lock.lock().await;
        let previous = self.snapshot();
        let last_timestamp = self.last_timestamp();
        let pass_started = Utc::now().timestamp_millis().max(0) as u64;

        let ws = workspace.clone();
        let extensions = self.text_extensions.clone();
        let (next, stats) = tokio::task::spawn_blocking(move || {
            run_pass(&ws, &extensions, &previous, last_timestamp)
        })
        .await
        .map_err(|e| ToolError::Internal(format!("Indexing task failed: {}", e)))?;

        info!(
            "Indexed workspace: {} indexed, {} skipped, {} deleted",
            stats.indexed, stats.skipped, stats.deleted
        );
        self.persist(&next, pass_started);
        self.swap(next, pass_started);
        Ok(stats)
    }

    /// Re-walk directories and re-parse files for the given paths only.
    pub async fn reindex_paths(
        &self,
        workspace: &Workspace,
        paths: &[String],
    ) -> ToolResult<IndexStats> {
        let _guard = self.pass_lock.lock().await;
        let mut next = (*self.snapshot()).clone();
        let last_timestamp = self.last_timestamp();

        let mut normalized = Vec::with_capacity(paths.len());
        for raw in paths {
            normalized.push(workspace.normalize(raw)?);
        }

        let ws = workspace.clone();
        let extensions = self.text_extensions.clone();
        let stats = tokio::task::spawn_blocking(move || {
            let mut stats = IndexStats::default();
            for rel in normalized {
                let abs = ws.root().join(&rel);
                if abs.is_dir() {
                    let prefix = format!("{}/", rel);
                    let stale: Vec<String> = next
                        .files
                        .keys()
                        .filter(|p| p.starts_with(&prefix))
                        .cloned()
                        .collect();
                    let mut seen = HashSet::new();
                    for entry in scanner::walk(&ws, &abs, None) {
                        if entry.is_dir || !is_text_file(&entry.relative, &extensions) {
                            continue;
                        }
                        seen.insert(entry.relative.clone());
                        if let Some(record) = read_record(&entry) {
                            next.files.insert(record.path.clone(), record);
                            stats.indexed += 1;
                        }
                    }
                    for path in stale {
                        if !seen.contains(&path) {
                            next.files.remove(&path);
                            stats.deleted += 1;
                        }
                    }
                } else if abs.is_file() {
                    if ws.is_ignored(&rel) || !is_text_file(&rel, &extensions) {
                        stats.skipped += 1;
                        continue;
                    }
                    let entry = WalkEntry {
                        size: fs::metadata(&abs).map(|m| m.len()).unwrap_or(0),
                        mtime: scanner::get_mtime(&abs).unwrap_or(0),
                        path: abs,
                        relative: rel,
                        is_dir: false,
                    };
                    if let Some(record) = read_record(&entry) {
                        next.files.insert(record.path.clone(), record);
                        stats.indexed += 1;
                    }
                } else if next.files.remove(&rel).is_some() {
                    stats.deleted += 1;
                }
            }
            (next, stats)
        })
        .await
        .map_err(|e| ToolError::Internal(format!("Reindex task failed: {}", e)))
        .map(|(next, stats)| {
            self.persist(&next, last_timestamp);
            self.swap(next, last_timestamp);
            stats
        })?;

        debug!("Reindexed paths: {:?}", stats);
        Ok(stats)
    }

    /// Definition matches first, then content matches on lines no
    /// definition already covers. Never empty: a miss yields one
    /// informational record.
    pub fn query(&self, term: &str) -> Vec<QueryHit> {
        query_index(&self.snapshot(), term)
    }
}

pub fn query_index(index: &CodeIndex, term: &str) -> Vec<QueryHit> {
    let needle = term.trim().to_lowercase();
    let mut hits = Vec::new();
    let mut covered: HashSet<(String, usize)> = HashSet::new();

    if !needle.is_empty() {
        for record in index.files.values() {
            for def in &record.definitions {
                if def.label().to_lowercase().contains(&needle) {
                    covered.insert((record.path.clone(), def.line));
                    hits.push(QueryHit {
                        file: record.path.clone(),
                        kind: def.kind.as_str().to_string(),
                        name: def.label().to_string(),
                        line: def.line,
                    });
                }
            }
        }

        for record in index.files.values() {
            for (idx, line) in record.content.lines().enumerate() {
                let line_no = idx + 1;
                if !line.to_lowercase().contains(&needle) {
                    continue;
                }
                if covered.insert((record.path.clone(), line_no)) {
                    hits.push(QueryHit {
                        file: record.path.clone(),
                        kind: "content".to_string(),
                        name: line.trim().chars().take(200).collect(),
                        line: line_no,
                    });
                }
            }
        }
    }

    if hits.is_empty() {
        hits.push(QueryHit {
            file: String::new(),
            kind: "info".to_string(),
            name: format!("No matches found for '{}'", term.trim()),
            line: 0,
        });
    }
    hits
}

fn is_text_file(rel: &str, extensions: &[String]) -> bool {
    let Some((_, ext)) = rel.rsplit_once('.') else {
        return false;
    };
    let ext = ext.to_ascii_lowercase();
    extensions.iter().any(|e| *e == ext)
}

fn read_record(entry: &WalkEntry) -> Option<FileRecord> {
    if entry.size > MAX_INDEXED_FILE_SIZE {
        debug!("Skipping large file ({} bytes): {}", entry.size, entry.relative);
        return None;
    }
    let bytes = match fs::read(&entry.path) {
        Ok(b) => b,
        Err(e) => {
            warn!("Failed to read file {}: {}", entry.path.display(), e);
            return None;
        }
    };
    let content = match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(_) => {
            debug!("Skipping binary file: {}", entry.relative);
            return None;
        }
    };
    let definitions = extract_definitions(&entry.relative, &content);
    Some(FileRecord {
        path: entry.relative.clone(),
        mtime: entry.mtime,
        size: entry.size,
        content,
        definitions,
    })
}

fn run_pass(
    workspace: &Workspace,
    extensions: &[String],
    previous: &CodeIndex,
    last_timestamp: u64,
) -> (CodeIndex, IndexStats) {
    let mut next = CodeIndex::default();
    let mut stats = IndexStats::default();

    for entry in scanner::walk(workspace, workspace.root(), None) {
        if entry.is_dir || !is_text_file(&entry.relative, extensions) {
            continue;
        }

        if let Some(prior) = previous.get(&entry.relative) {
            let unchanged = entry.mtime <= last_timestamp
                && prior.mtime == entry.mtime
                && prior.size == entry.size;
            if unchanged {
                next.files.insert(entry.relative.clone(), prior.clone());
                stats.skipped += 1;
                continue;
            }
        }

        if let Some(record) = read_record(&entry) {
            next.files.insert(record.path.clone(), record);
            stats.indexed += 1;
        }
    }

    stats.deleted = previous
        .files
        .keys()
        .filter(|p| !next.files.contains_key(*p))
        .count();

    (next, stats)
}

/// Count of TODO entries in the index.
pub fn todo_count(index: &CodeIndex) -> usize {
    index
        .files
        .values()
        .flat_map(|f| f.definitions.iter())
        .filter(|d| d.kind == DefinitionKind::Todo)
        .count()
}

