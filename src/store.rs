//! Opaque key-value persistence.
//!
//! The core persists its code index, index timestamp, checkpoints and tool
//! execution logs through `ObjectStore`. `FileStore` keeps one JSON file per
//! key in a per-workspace directory; `MemoryStore` backs tests.

use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

/// Namespace UUID for per-workspace state directories
const TOOLSMITH_NAMESPACE: Uuid = Uuid::from_bytes([
    0x3c, 0x51, 0x0e, 0x92, 0x4f, 0x7a, 0x4b, 0x1d, 0x9a, 0x66, 0x20, 0xd4, 0x8e, 0x17, 0xb2, 0x05,
]);

/// Compute a UUID v5 from the workspace root path.
/// Same path always maps to the same state directory.
pub fn compute_path_uuid(path: &Path) -> String {
    let normalized = path.to_string_lossy().replace('\\', "/");
    Uuid::new_v5(&TOOLSMITH_NAMESPACE, normalized.as_bytes()).to_string()
}

pub trait ObjectStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>>;
    fn put(&self, key: &str, value: &Value) -> Result<()>;
    fn delete(&self, key: &str) -> Result<()>;
    /// Keys starting with `prefix`, sorted.
    fn keys(&self, prefix: &str) -> Result<Vec<String>>;
}

/// In-process store, used by tests and by runs without a data directory.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ObjectStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &Value) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        entries.insert(key.to_string(), value.clone());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        entries.remove(key);
        Ok(())
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        Ok(entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// JSON-file store: `<base>/<workspace-uuid>/<encoded key>.json`.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(base_dir: &Path, workspace_root: &Path) -> Result<Self> {
        let dir = base_dir.join(compute_path_uuid(workspace_root));
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create state directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", encode_key(key)))
    }
}

impl ObjectStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Some(value))
    }

    fn put(&self, key: &str, value: &Value) -> Result<()> {
        let path = self.path_for(key);
        let content = serde_json::to_string(value).context("Failed to serialize value")?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to move {} into place", path.display()))
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to delete {}", path.display()))?;
        }
        Ok(())
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to list {}", self.dir.display()))?
        {
            let name = entry?.file_name().to_string_lossy().to_string();
            if let Some(encoded) = name.strip_suffix(".json") {
                let key = decode_key(encoded);
                if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// Keys may contain `/`; map them onto flat, reversible file names.
fn encode_key(key: &str) -> String {
    key.replace('%', "%25").replace('/', "%2F")
}

fn decode_key(encoded: &str) -> String {
    encoded.replace("%2F", "/").replace("%25", "%")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_compute_path_uuid_is_stable() {
        let a = compute_path_uuid(Path::new("/work/project"));
        let b = compute_path_uuid(Path::new("/work/project"));
        let c = compute_path_uuid(Path::new("/work/other"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        store.put("checkpoints/1", &json!({"name": "a"})).unwrap();
        store.put("checkpoints/2", &json!({"name": "b"})).unwrap();
        store.put("code_index", &json!({})).unwrap();

        assert_eq!(store.keys("checkpoints/").unwrap().len(), 2);
        store.delete("checkpoints/1").unwrap();
        assert!(store.get("checkpoints/1").unwrap().is_none());
        assert_eq!(store.get("checkpoints/2").unwrap(), Some(json!({"name": "b"})));
    }

    #[test]
    fn test_file_store_keys_with_slashes() {
        let base = TempDir::new().unwrap();
        let store = FileStore::new(base.path(), Path::new("/work/project")).unwrap();

        store.put("logs/tool-executions", &json!([1, 2])).unwrap();
        store.put("last_index_timestamp", &json!(42)).unwrap();

        assert_eq!(
            store.keys("logs/").unwrap(),
            vec!["logs/tool-executions".to_string()]
        );
        assert_eq!(store.get("last_index_timestamp").unwrap(), Some(json!(42)));
        assert!(store.get("missing").unwrap().is_none());
    }
}
