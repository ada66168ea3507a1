//! Result cache for read-only tools.
//!
//! Entries are read with `peek`, so recency never changes and the LRU
//! container evicts in insertion order.

use lru::LruCache;
use serde_json::Value;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

/// Argument keys that name workspace paths.
const PATH_KEYS: &[&str] = &[
    "filename",
    "filenames",
    "path",
    "paths",
    "old_path",
    "new_path",
];

struct Entry {
    value: Value,
    tool: String,
    paths: Vec<String>,
    stored_at: Instant,
}

pub struct ResultCache {
    entries: Mutex<LruCache<String, Entry>>,
    ttl: Duration,
    hits: AtomicU64,
}

pub fn normalize_path(raw: &str) -> String {
    let cleaned = raw.trim().replace('\\', "/");
    let cleaned = cleaned.trim_start_matches("./");
    cleaned.trim_matches('/').to_string()
}

/// Workspace paths referenced by `args`, normalized.
pub fn referenced_paths(args: &Value) -> Vec<String> {
    let mut paths = Vec::new();
    for key in PATH_KEYS {
        match args.get(*key) {
            Some(Value::String(s)) => paths.push(normalize_path(s)),
            Some(Value::Array(items)) => paths.extend(
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(normalize_path),
            ),
            _ => {}
        }
    }
    paths.retain(|p| !p.is_empty());
    paths
}

fn cache_key(tool: &str, args: &Value) -> String {
    // serde_json maps are ordered, so equal arguments serialize identically.
    format!("{}:{}", tool, args)
}

fn covers(mutated: &str, cached: &str) -> bool {
    mutated.is_empty()
        || cached == mutated
        || cached.starts_with(&format!("{}/", mutated))
}

impl ResultCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
            hits: AtomicU64::new(0),
        }
    }

    pub fn get(&self, tool: &str, args: &Value) -> Option<Value> {
        let key = cache_key(tool, args);
        let mut entries = self.entries.lock().ok()?;
        let fresh = match entries.peek(&key) {
            Some(entry) => entry.stored_at.elapsed() <= self.ttl,
            None => return None,
        };
        if !fresh {
            entries.pop(&key);
            return None;
        }
        self.hits.fetch_add(1, Ordering::Relaxed);
        entries.peek(&key).map(|e| e.value.clone())
    }

    pub fn put(&self, tool: &str, args: &Value, value: Value) {
        let key = cache_key(tool, args);
        if let Ok(mut entries) = self.entries.lock() {
            entries.put(
                key,
                Entry {
                    value,
                    tool: tool.to_string(),
                    paths: referenced_paths(args),
                    stored_at: Instant::now(),
                },
            );
        }
    }

    fn remove_where(&self, predicate: impl Fn(&Entry) -> bool) -> usize {
        let Ok(mut entries) = self.entries.lock() else {
            return 0;
        };
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| predicate(entry))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            entries.pop(key);
        }
        doomed.len()
    }

    /// Drop entries whose arguments reference `path` or anything under it.
    pub fn invalidate_path(&self, path: &str) -> usize {
        let path = normalize_path(path);
        let removed = self.remove_where(|e| e.paths.iter().any(|p| covers(&path, p)));
        if removed > 0 {
            debug!(path = %path, removed, "invalidated cached results");
        }
        removed
    }

    pub fn invalidate_tool(&self, tool: &str) -> usize {
        self.remove_where(|e| e.tool == tool)
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

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hit_and_expiry() {
        let cache = ResultCache::new(10, Duration::from_millis(30));
        let args = json!({"filename": "a.txt"});
        cache.put("read_file", &args, json!({"content": "x"}));
        assert_eq!(cache.get("read_file", &args).unwrap()["content"], "x");
        assert!(cache.get("read_file", &json!({"filename": "b.txt"})).is_none());
        assert_eq!(cache.hits(), 1);

        std::thread::sleep(Duration::from_millis(50));
        assert!(cache.get("read_file", &args).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_evicts_oldest_first_even_after_reads() {
        let cache = ResultCache::new(2, Duration::from_secs(30));
        let a = json!({"filename": "a"});
        let b = json!({"filename": "b"});
        cache.put("read_file", &a, json!(1));
        cache.put("read_file", &b, json!(2));
        // A read does not refresh "a".
        assert!(cache.get("read_file", &a).is_some());
        cache.put("read_file", &json!({"filename": "c"}), json!(3));
        assert!(cache.get("read_file", &a).is_none());
        assert!(cache.get("read_file", &b).is_some());
    }

    #[test]
    fn test_invalidate_by_path_and_folder() {
        let cache = ResultCache::new(10, Duration::from_secs(30));
        cache.put("read_file", &json!({"filename": "./src/a.rs"}), json!(1));
        cache.put("search_in_file", &json!({"filename": "src/a.rs", "pattern": "x"}), json!(2));
        cache.put("read_file", &json!({"filename": "src_old/a.rs"}), json!(3));
        cache.put("get_project_structure", &json!({}), json!(4));

        assert_eq!(cache.invalidate_path("src/a.rs"), 2);
        cache.put("read_file", &json!({"filename": "src/b.rs"}), json!(5));
        assert_eq!(cache.invalidate_path("src/"), 1);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.invalidate_tool("get_project_structure"), 1);
    }

    #[test]
    fn test_referenced_paths() {
        let paths = referenced_paths(&json!({
            "filenames": ["a.rs", "./b/c.rs"],
            "old_path": "x/",
            "pattern": "ignored"
        }));
        assert_eq!(paths, vec!["a.rs", "b/c.rs", "x"]);
    }
}
