//! Workspace walking.
//!
//! Uses `ignore::WalkBuilder` so `.gitignore` files are honored recursively,
//! with the workspace ignore patterns applied as a prefix filter on top.

use ignore::WalkBuilder;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, warn};

use super::types::Workspace;

/// Files larger than this are never read into the index.
pub const MAX_INDEXED_FILE_SIZE: u64 = 1024 * 1024;

/// Custom ignore file honored next to `.gitignore`.
pub const IGNORE_FILE_NAME: &str = ".toolsmithignore";

#[derive(Debug, Clone)]
pub struct WalkEntry {
    pub path: PathBuf,
    pub relative: String,
    pub is_dir: bool,
    pub size: u64,
    pub mtime: u64,
}

/// Build a WalkBuilder rooted at `start` with all ignore rules configured.
fn build_walker(workspace: &Workspace, start: &Path) -> WalkBuilder {
    let mut builder = WalkBuilder::new(start);

    builder.standard_filters(true);
    builder.hidden(false);
    builder.git_ignore(true);
    builder.git_global(false);
    builder.git_exclude(true);
    builder.require_git(false);
    builder.follow_links(false);
    builder.add_custom_ignore_filename(IGNORE_FILE_NAME);

    let ws = workspace.clone();
    builder.filter_entry(move |entry| match ws.relative(entry.path()) {
        Some(rel) if !rel.is_empty() => !ws.is_ignored(&rel),
        _ => true,
    });

    builder
}

/// Walk `start` (inside the workspace), returning every non-ignored entry
/// except `start` itself. Entries are sorted by relative path.
pub fn walk(workspace: &Workspace, start: &Path, max_depth: Option<usize>) -> Vec<WalkEntry> {
    let mut builder = build_walker(workspace, start);
    builder.max_depth(max_depth);

    let mut entries = Vec::new();
    for entry in builder.build() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Error walking directory: {}", e);
                continue;
            }
        };
        let path = entry.path();
        if path == start {
            continue;
        }
        let relative = match workspace.relative(path) {
            Some(rel) => rel,
            None => {
                warn!("Failed to get relative path for {}", path.display());
                continue;
            }
        };
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        let metadata = fs::metadata(path).ok();
        entries.push(WalkEntry {
            path: path.to_path_buf(),
            relative,
            is_dir,
            size: metadata.as_ref().map(|m| m.len()).unwrap_or(0),
            mtime: metadata.as_ref().and_then(mtime_of).unwrap_or(0),
        });
    }

    entries.sort_by(|a, b| a.relative.cmp(&b.relative));
    debug!("Walked {} entries under {}", entries.len(), start.display());
    entries
}

/// Files and folders under a folder, `start` itself excluded.
#[derive(Debug, Default)]
pub struct FolderTree {
    pub files: Vec<PathBuf>,
    pub dirs: Vec<PathBuf>,
}

/// Every entry under `start`, ignoring nothing. Used to snapshot folders,
/// so any walk error fails the whole listing.
pub fn walk_tree(start: &Path) -> Result<FolderTree, ignore::Error> {
    let mut builder = WalkBuilder::new(start);
    builder.standard_filters(false).follow_links(false);

    let mut tree = FolderTree::default();
    for entry in builder.build() {
        let entry = entry?;
        if entry.depth() == 0 {
            continue;
        }
        match entry.file_type() {
            Some(t) if t.is_dir() => tree.dirs.push(entry.into_path()),
            Some(t) if t.is_file() => tree.files.push(entry.into_path()),
            _ => {}
        }
    }
    Ok(tree)
}

fn mtime_of(metadata: &fs::Metadata) -> Option<u64> {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as u64)
}

/// Modification time in milliseconds since the epoch.
pub fn get_mtime(path: &Path) -> Option<u64> {
    fs::metadata(path).ok().as_ref().and_then(mtime_of)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_walk_skips_ignored_prefixes() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        fs::write(dir.path().join("src/main.rs"), "fn main() {}").unwrap();
        fs::write(dir.path().join("node_modules/pkg/index.js"), "x").unwrap();
        fs::write(dir.path().join(".env"), "A=1").unwrap();

        let ws = Workspace::new(dir.path().to_path_buf(), vec!["node_modules".into()]);
        let entries = walk(&ws, dir.path(), None);
        let paths: Vec<_> = entries.iter().map(|e| e.relative.as_str()).collect();

        assert!(paths.contains(&"src"));
        assert!(paths.contains(&"src/main.rs"));
        assert!(paths.contains(&".env"));
        assert!(!paths.iter().any(|p| p.starts_with("node_modules")));
    }

    #[test]
    fn test_walk_respects_gitignore() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".gitignore"), "*.log\n").unwrap();
        fs::write(dir.path().join("app.log"), "noise").unwrap();
        fs::write(dir.path().join("app.rs"), "fn a() {}").unwrap();

        let ws = Workspace::new(dir.path().to_path_buf(), Vec::new());
        let entries = walk(&ws, dir.path(), None);
        assert!(entries.iter().any(|e| e.relative == "app.rs"));
        assert!(!entries.iter().any(|e| e.relative == "app.log"));
    }

    #[test]
    fn test_walk_tree_includes_hidden_and_empty_dirs() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a/.b")).unwrap();
        fs::create_dir_all(dir.path().join("a/empty")).unwrap();
        fs::write(dir.path().join("a/.b/c.txt"), "c").unwrap();
        let tree = walk_tree(&dir.path().join("a")).unwrap();
        assert_eq!(tree.files.len(), 1);
        assert_eq!(tree.dirs.len(), 2);
        assert!(tree.dirs.contains(&dir.path().join("a/empty")));
    }

    #[test]
    fn test_walk_tree_missing_start_errors() {
        let dir = TempDir::new().unwrap();
        assert!(walk_tree(&dir.path().join("gone")).is_err());
    }
}
