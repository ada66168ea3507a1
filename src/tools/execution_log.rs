//! Tool execution log.
//!
//! Every dispatched call is buffered as a [`ToolExecutionEvent`] and
//! periodically appended to the object store under [`EXECUTION_LOG_KEY`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::store::ObjectStore;

/// Environment variable that turns the execution log off
pub const DISABLE_EXECUTION_LOG_ENV: &str = "TOOLSMITH_DISABLE_EXECUTION_LOG";

pub const EXECUTION_LOG_KEY: &str = "logs/tool-executions";

/// Buffered events before a flush is triggered
const FLUSH_THRESHOLD: usize = 25;

/// Events retained in the persisted log
const MAX_PERSISTED_EVENTS: usize = 1000;

pub fn is_execution_log_enabled() -> bool {
    match std::env::var(DISABLE_EXECUTION_LOG_ENV) {
        Ok(val) => !matches!(val.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => true,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecutionEvent {
    pub request_id: String,
    pub tool_name: String,
    /// Arguments as a JSON string
    pub tool_input: String,
    pub is_error: bool,
    pub duration_ms: u64,
    pub cached: bool,
    pub event_time: DateTime<Utc>,
}

#[derive(Clone)]
pub struct ExecutionLog {
    events: Arc<RwLock<Vec<ToolExecutionEvent>>>,
    store: Arc<dyn ObjectStore>,
    enabled: bool,
}

impl ExecutionLog {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        let enabled = is_execution_log_enabled();
        if !enabled {
            debug!("Execution log disabled via {}", DISABLE_EXECUTION_LOG_ENV);
        }
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            store,
            enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub async fn record(
        &self,
        request_id: String,
        tool_name: &str,
        tool_input: &serde_json::Value,
        is_error: bool,
        duration_ms: u64,
        cached: bool,
    ) {
        if !self.enabled {
            return;
        }

        let event = ToolExecutionEvent {
            request_id,
            tool_name: tool_name.to_string(),
            tool_input: serde_json::to_string(tool_input).unwrap_or_default(),
            is_error,
            duration_ms,
            cached,
            event_time: Utc::now(),
        };

        let pending = {
            let mut events = self.events.write().await;
            events.push(event);
            events.len()
        };
        debug!("Recorded execution event, total pending: {}", pending);

        if pending >= FLUSH_THRESHOLD {
            self.flush().await;
        }
    }

    /// Append pending events to the persisted log.
    pub async fn flush(&self) {
        if !self.enabled {
            return;
        }

        let events = {
            let mut events = self.events.write().await;
            std::mem::take(&mut *events)
        };
        if events.is_empty() {
            return;
        }

        debug!("Flushing {} execution events", events.len());
        if let Err(e) = self.append(events) {
            // Dropped rather than re-queued to keep the buffer bounded.
            warn!("Failed to persist execution events: {}", e);
        }
    }

    fn append(&self, events: Vec<ToolExecutionEvent>) -> anyhow::Result<()> {
        let mut persisted: Vec<ToolExecutionEvent> = match self.store.get(EXECUTION_LOG_KEY)? {
            Some(value) => serde_json::from_value(value).unwrap_or_default(),
            None => Vec::new(),
        };
        persisted.extend(events);
        if persisted.len() > MAX_PERSISTED_EVENTS {
            let excess = persisted.len() - MAX_PERSISTED_EVENTS;
            persisted.drain(..excess);
        }
        self.store
            .put(EXECUTION_LOG_KEY, &serde_json::to_value(&persisted)?)
    }

    pub async fn pending_count(&self) -> usize {
        self.events.read().await.len()
    }

    /// Persisted events, oldest first.
    pub fn persisted(&self) -> Vec<ToolExecutionEvent> {
        self.store
            .get(EXECUTION_LOG_KEY)
            .ok()
            .flatten()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }
}
