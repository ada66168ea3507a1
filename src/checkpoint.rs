//! Named snapshots of editor state, written through to the object store.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::store::ObjectStore;

const CHECKPOINT_PREFIX: &str = "checkpoints/";
const MAX_CHECKPOINTS: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub id: String,
    pub name: String,
    pub editor_state: Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointSummary {
    pub id: String,
    pub name: String,
    pub timestamp: DateTime<Utc>,
}

pub struct CheckpointStore {
    store: Arc<dyn ObjectStore>,
}

impl CheckpointStore {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub fn create(&self, name: &str, editor_state: Value) -> Result<Checkpoint> {
        let timestamp = Utc::now();
        // Zero-padded millis keep lexical key order chronological.
        let id = format!(
            "{:013}-{}",
            timestamp.timestamp_millis(),
            Uuid::new_v4().simple()
        );
        let checkpoint = Checkpoint {
            id: id.clone(),
            name: name.to_string(),
            editor_state,
            timestamp,
        };
        self.store
            .put(
                &format!("{}{}", CHECKPOINT_PREFIX, id),
                &serde_json::to_value(&checkpoint).context("Failed to serialize checkpoint")?,
            )
            .context("Failed to persist checkpoint")?;
        debug!(checkpoint = %id, name, "checkpoint created");
        self.prune()?;
        Ok(checkpoint)
    }

    fn prune(&self) -> Result<()> {
        let keys = self.store.keys(CHECKPOINT_PREFIX)?;
        if keys.len() > MAX_CHECKPOINTS {
            for key in &keys[..keys.len() - MAX_CHECKPOINTS] {
                self.store.delete(key)?;
            }
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<Checkpoint>> {
        match self.store.get(&format!("{}{}", CHECKPOINT_PREFIX, id))? {
            Some(value) => Ok(Some(
                serde_json::from_value(value).context("Corrupt checkpoint record")?,
            )),
            None => Ok(None),
        }
    }

    /// Newest first.
    pub fn list(&self) -> Result<Vec<CheckpointSummary>> {
        let mut keys = self.store.keys(CHECKPOINT_PREFIX)?;
        keys.reverse();
        let mut summaries = Vec::with_capacity(keys.len());
        for key in keys {
            let id = key.trim_start_matches(CHECKPOINT_PREFIX);
            if let Some(cp) = self.get(id)? {
                summaries.push(CheckpointSummary {
                    id: cp.id,
                    name: cp.name,
                    timestamp: cp.timestamp,
                });
            }
        }
        Ok(summaries)
    }
}
