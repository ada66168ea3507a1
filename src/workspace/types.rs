//! Workspace handle and path resolution.
//!
//! Tool paths are forward-slash strings relative to the workspace root. The
//! root's own directory name is not accepted as a leading component unless a
//! child of that name actually exists.

use std::path::{Component, Path, PathBuf};

use crate::error::{ToolError, ToolResult};

/// Root filesystem handle plus an ordered set of ignore patterns.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    ignore_patterns: Vec<String>,
}

impl Workspace {
    pub fn new(root: PathBuf, ignore_patterns: Vec<String>) -> Self {
        let ignore_patterns = ignore_patterns
            .into_iter()
            .map(|p| p.trim().trim_end_matches('/').to_string())
            .filter(|p| !p.is_empty())
            .collect();
        Self {
            root,
            ignore_patterns,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn root_name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    pub fn ignore_patterns(&self) -> &[String] {
        &self.ignore_patterns
    }

    /// Normalize a caller-supplied path to the canonical relative form.
    pub fn normalize(&self, raw: &str) -> ToolResult<String> {
        let cleaned = raw.trim().replace('\\', "/");
        if cleaned.is_empty() {
            return Err(ToolError::BadRequest("Path must not be empty".to_string()));
        }
        if cleaned.starts_with('/') || Path::new(&cleaned).is_absolute() {
            return Err(ToolError::BadRequest(format!(
                "Path '{}' must be relative to the workspace root",
                raw
            )));
        }

        let mut parts: Vec<&str> = Vec::new();
        for component in Path::new(&cleaned).components() {
            match component {
                Component::Normal(part) => parts.push(part.to_str().unwrap_or_default()),
                Component::CurDir => {}
                Component::ParentDir => {
                    return Err(ToolError::BadRequest(format!(
                        "Path '{}' escapes the workspace root",
                        raw
                    )));
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(ToolError::BadRequest(format!(
                        "Path '{}' must be relative to the workspace root",
                        raw
                    )));
                }
            }
        }

        if let Some(first) = parts.first() {
            let root_name = self.root_name();
            if !root_name.is_empty() && *first == root_name && !self.root.join(first).exists() {
                return Err(ToolError::BadRequest(format!(
                    "Path '{}' starts with the workspace name '{}'; use a path relative to the root",
                    raw, root_name
                )));
            }
        }

        Ok(parts.join("/"))
    }

    /// Relative forward-slash path for an absolute path under the root.
    pub fn relative(&self, abs: &Path) -> Option<String> {
        abs.strip_prefix(&self.root)
            .ok()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
    }

    /// True when any prefix of `rel` matches an ignore pattern.
    pub fn is_ignored(&self, rel: &str) -> bool {
        let rel = rel.trim_start_matches("./");
        self.ignore_patterns.iter().any(|pattern| {
            rel == pattern
                || rel.starts_with(&format!("{}/", pattern))
                || rel.split('/').any(|segment| segment == pattern)
        })
    }

    /// Probe whether `path` (or its closest existing ancestor) is writable.
    ///
    /// A read-only workspace root means write access was never granted and
    /// needs user activation; a read-only file is reported as a plain denial.
    pub fn probe_write(&self, path: &Path) -> ToolResult<()> {
        let root_meta = std::fs::metadata(&self.root)
            .map_err(|e| ToolError::from_io(e, &self.root.display().to_string()))?;
        if root_meta.permissions().readonly() {
            return Err(ToolError::PermissionDenied(format!(
                "User activation required: write access to {} has not been granted",
                self.root.display()
            )));
        }

        let mut probe = Some(path);
        while let Some(candidate) = probe {
            if let Ok(meta) = std::fs::metadata(candidate) {
                if meta.permissions().readonly() {
                    return Err(ToolError::PermissionDenied(format!(
                        "{} is read-only",
                        self.relative(candidate)
                            .unwrap_or_else(|| candidate.display().to_string())
                    )));
                }
                return Ok(());
            }
            probe = candidate.parent();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn workspace(dir: &TempDir) -> Workspace {
        Workspace::new(
            dir.path().to_path_buf(),
            vec!["node_modules/".into(), ".git".into(), "dist".into()],
        )
    }

    #[test]
    fn test_normalize_paths() {
        let dir = TempDir::new().unwrap();
        let ws = workspace(&dir);
        assert_eq!(ws.normalize("./src\\main.rs").unwrap(), "src/main.rs");
        assert_eq!(ws.normalize("src//lib.rs").unwrap(), "src/lib.rs");
        assert!(ws.normalize("../etc/passwd").is_err());
        assert!(ws.normalize("/etc/passwd").is_err());
        assert!(ws.normalize("  ").is_err());
    }

    #[test]
    fn test_leading_root_name_rejected() {
        let dir = TempDir::new().unwrap();
        let ws = workspace(&dir);
        let root_name = ws.root_name();
        let err = ws.normalize(&format!("{}/src/a.rs", root_name)).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::BadRequest);
    }

    #[test]
    fn test_ignore_prefix_matching() {
        let dir = TempDir::new().unwrap();
        let ws = workspace(&dir);
        assert!(ws.is_ignored("node_modules/react/index.js"));
        assert!(ws.is_ignored(".git"));
        assert!(ws.is_ignored("packages/app/dist/bundle.js"));
        assert!(!ws.is_ignored("src/distance.rs"));
    }

    #[test]
    fn test_probe_write_on_writable_root() {
        let dir = TempDir::new().unwrap();
        let ws = workspace(&dir);
        assert!(ws.probe_write(&dir.path().join("new/file.txt")).is_ok());
    }
}
