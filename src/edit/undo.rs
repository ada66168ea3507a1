//! Bounded stack of pre-change snapshots.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Mutex;

pub const DEFAULT_UNDO_CAPACITY: usize = 50;

/// State of a path immediately before a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Snapshot {
    /// The file existed with these bytes.
    File { bytes: Vec<u8> },
    /// Nothing existed; undo removes what the operation created, then the
    /// parent folders it had to create (deepest first) if they are empty.
    Absent { dir: bool, created_parents: Vec<String> },
    /// The operation moved `from` to `to`; undo moves it back.
    Renamed { from: String, to: String },
    /// A folder's subfolders and files, relative to the folder.
    Tree {
        dirs: Vec<String>,
        files: Vec<(String, Vec<u8>)>,
    },
}

impl Snapshot {
    pub fn describe(&self) -> &'static str {
        match self {
            Snapshot::File { .. } => "file content",
            Snapshot::Absent { dir: true, .. } => "created folder",
            Snapshot::Absent { dir: false, .. } => "created file",
            Snapshot::Renamed { .. } => "rename",
            Snapshot::Tree { .. } => "folder tree",
        }
    }
}

#[derive(Debug, Clone)]
pub struct UndoEntry {
    pub path: String,
    pub snapshot: Snapshot,
    pub tool: String,
    pub timestamp: DateTime<Utc>,
}

impl UndoEntry {
    pub fn new(path: impl Into<String>, snapshot: Snapshot, tool: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            snapshot,
            tool: tool.into(),
            timestamp: Utc::now(),
        }
    }
}

/// LIFO for undo, oldest entry evicted once full.
pub struct UndoStack {
    entries: Mutex<VecDeque<UndoEntry>>,
    capacity: usize,
}

impl UndoStack {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&self, entry: UndoEntry) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub fn pop(&self) -> Option<UndoEntry> {
        self.entries.lock().ok()?.pop_back()
    }

    pub fn peek(&self) -> Option<UndoEntry> {
        self.entries.lock().ok()?.back().cloned()
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new(DEFAULT_UNDO_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str) -> UndoEntry {
        UndoEntry::new(path, Snapshot::File { bytes: vec![] }, "edit_file")
    }

    #[test]
    fn test_lifo() {
        let stack = UndoStack::default();
        stack.push(entry("a"));
        stack.push(entry("b"));
        assert_eq!(stack.peek().unwrap().path, "b");
        assert_eq!(stack.pop().unwrap().path, "b");
        assert_eq!(stack.pop().unwrap().path, "a");
        assert!(stack.pop().is_none());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let stack = UndoStack::default();
        for i in 0..55 {
            stack.push(entry(&format!("f{}", i)));
        }
        assert_eq!(stack.len(), 50);
        let mut last = None;
        while let Some(e) = stack.pop() {
            last = Some(e.path);
        }
        assert_eq!(last.as_deref(), Some("f5"));
    }

    #[test]
    fn test_clear() {
        let stack = UndoStack::new(3);
        stack.push(entry("a"));
        stack.clear();
        assert!(stack.is_empty());
    }
}
