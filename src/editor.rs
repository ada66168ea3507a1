//! Editor host collaborator.
//!
//! The core never inspects editor state; it only snapshots it for
//! checkpoints and pushes new content into open buffers.

use serde_json::{json, Value};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;

const RECENT_FILES: usize = 20;

pub trait EditorHost: Send + Sync {
    /// Opaque state captured before checkpoint-creating tools run.
    fn snapshot_state(&self) -> anyhow::Result<Value>;

    fn is_open(&self, path: &str) -> bool;

    fn update_buffer(&self, path: &str, content: &str);

    /// Called after every successful write, open or not.
    fn note_touched(&self, _path: &str) {}
}

/// Editor stand-in for headless use: no open buffers, but it remembers the
/// files the tools touched so checkpoints carry something useful.
pub struct DetachedEditor {
    root: PathBuf,
    recent: Mutex<VecDeque<String>>,
}

impl DetachedEditor {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            recent: Mutex::new(VecDeque::new()),
        }
    }

    pub fn recent_files(&self) -> Vec<String> {
        self.recent
            .lock()
            .map(|r| r.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl EditorHost for DetachedEditor {
    fn snapshot_state(&self) -> anyhow::Result<Value> {
        Ok(json!({
            "root": self.root.display().to_string(),
            "recentFiles": self.recent_files(),
        }))
    }

    fn is_open(&self, _path: &str) -> bool {
        false
    }

    fn update_buffer(&self, _path: &str, _content: &str) {}

    fn note_touched(&self, path: &str) {
        if let Ok(mut recent) = self.recent.lock() {
            recent.retain(|p| p != path);
            recent.push_front(path.to_string());
            recent.truncate(RECENT_FILES);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_files_dedupe_and_cap() {
        let editor = DetachedEditor::new(PathBuf::from("/ws"));
        for i in 0..25 {
            editor.note_touched(&format!("f{}.rs", i));
        }
        editor.note_touched("f10.rs");
        let recent = editor.recent_files();
        assert_eq!(recent.len(), 20);
        assert_eq!(recent[0], "f10.rs");
        assert_eq!(recent.iter().filter(|p| *p == "f10.rs").count(), 1);

        let state = editor.snapshot_state().unwrap();
        assert_eq!(state["root"], "/ws");
        assert!(!editor.is_open("f10.rs"));
    }
}
