//! Code index data model and persistence.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

use crate::store::ObjectStore;

pub const CODE_INDEX_KEY: &str = "code_index";
pub const LAST_INDEX_TIMESTAMP_KEY: &str = "last_index_timestamp";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefinitionKind {
    Function,
    Class,
    Variable,
    Method,
    Todo,
    File,
}

impl DefinitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DefinitionKind::Function => "function",
            DefinitionKind::Class => "class",
            DefinitionKind::Variable => "variable",
            DefinitionKind::Method => "method",
            DefinitionKind::Todo => "todo",
            DefinitionKind::File => "file",
        }
    }
}

/// Entry extracted from source. TODOs carry `content`, everything else `name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Definition {
    #[serde(rename = "type")]
    pub kind: DefinitionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// 1-based; 0 for whole-file entries.
    pub line: usize,
}

impl Definition {
    pub fn named(kind: DefinitionKind, name: impl Into<String>, line: usize) -> Self {
        Self {
            kind,
            name: Some(name.into()),
            content: None,
            line,
        }
    }

    pub fn todo(content: impl Into<String>, line: usize) -> Self {
        Self {
            kind: DefinitionKind::Todo,
            name: None,
            content: Some(content.into()),
            line,
        }
    }

    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .or(self.content.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub mtime: u64,
    pub size: u64,
    pub content: String,
    pub definitions: Vec<Definition>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub indexed: usize,
    pub skipped: usize,
    pub deleted: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeIndex {
    pub files: BTreeMap<String, FileRecord>,
}

impl CodeIndex {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&FileRecord> {
        self.files.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn definition_count(&self) -> usize {
        self.files.values().map(|f| f.definitions.len()).sum()
    }
}

/// Load the persisted index and its timestamp; missing keys yield empty state.
pub fn load(store: &dyn ObjectStore) -> Result<(CodeIndex, u64)> {
    let index = match store.get(CODE_INDEX_KEY)? {
        Some(value) => serde_json::from_value(value).context("Failed to parse stored code index")?,
        None => CodeIndex::default(),
    };
    let timestamp = store
        .get(LAST_INDEX_TIMESTAMP_KEY)?
        .and_then(|v| v.as_u64())
        .unwrap_or(0);
    Ok((index, timestamp))
}

pub fn save(store: &dyn ObjectStore, index: &CodeIndex, timestamp: u64) -> Result<()> {
    let value = serde_json::to_value(index).context("Failed to serialize code index")?;
    store.put(CODE_INDEX_KEY, &value)?;
    store.put(LAST_INDEX_TIMESTAMP_KEY, &json!(timestamp))?;
    Ok(())
}
