use futures_util::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::debug;

use super::context::ToolContext;
use super::params::{json_schema, ParamSpec};
use crate::error::{ToolError, ToolResult};

pub type ToolHandler =
    Arc<dyn Fn(ToolContext, Value) -> BoxFuture<'static, ToolResult<Value>> + Send + Sync>;

/// Wrap an async fn as a [`ToolHandler`].
pub fn handler<F, Fut>(f: F) -> ToolHandler
where
    F: Fn(ToolContext, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ToolResult<Value>> + Send + 'static,
{
    Arc::new(move |ctx, args| Box::pin(f(ctx, args)))
}

#[derive(Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParamSpec>,
    pub requires_project: bool,
    pub creates_checkpoint: bool,
    /// Results may be served from the result cache.
    pub cacheable: bool,
    /// Overrides the dispatcher's default budget.
    pub timeout: Option<Duration>,
    pub handler: ToolHandler,
}

impl std::fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("requires_project", &self.requires_project)
            .field("creates_checkpoint", &self.creates_checkpoint)
            .field("cacheable", &self.cacheable)
            .finish()
    }
}

impl ToolDescriptor {
    pub fn new(name: &str, description: &str, handler: ToolHandler) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters: Vec::new(),
            requires_project: false,
            creates_checkpoint: false,
            cacheable: false,
            timeout: None,
            handler,
        }
    }

    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.parameters.push(spec);
        self
    }

    pub fn requires_project(mut self) -> Self {
        self.requires_project = true;
        self
    }

    /// Mutating tool: checkpoint first, invalidate caches after.
    pub fn creates_checkpoint(mut self) -> Self {
        self.creates_checkpoint = true;
        self
    }

    pub fn cacheable(mut self) -> Self {
        self.cacheable = true;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn summary(&self) -> ToolSummary {
        ToolSummary {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: json_schema(&self.parameters),
            requires_project: self.requires_project,
            creates_checkpoint: self.creates_checkpoint,
        }
    }
}

/// Serializable view of a descriptor.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSummary {
    pub name: String,
    pub description: String,
    pub parameters: Value,
    pub requires_project: bool,
    pub creates_checkpoint: bool,
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<ToolDescriptor>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `descriptor`, replacing any tool with the same name.
    /// Returns true when an existing registration was replaced.
    pub fn register(&self, descriptor: ToolDescriptor) -> ToolResult<bool> {
        let name = descriptor.name.trim().to_string();
        if name.is_empty() {
            return Err(ToolError::BadRequest("Tool name must not be empty".to_string()));
        }
        if let Some(dup) = descriptor
            .parameters
            .iter()
            .enumerate()
            .find(|(i, p)| descriptor.parameters[..*i].iter().any(|q| q.name == p.name))
        {
            return Err(ToolError::BadRequest(format!(
                "Tool '{}' declares parameter '{}' twice",
                name, dup.1.name
            )));
        }

        let mut tools = self
            .tools
            .write()
            .map_err(|_| ToolError::Internal("Tool registry poisoned".to_string()))?;
        let replaced = tools.insert(name.clone(), Arc::new(descriptor)).is_some();
        if replaced {
            debug!(tool = %name, "tool registration overridden");
        }
        Ok(replaced)
    }

    pub fn register_all(&self, descriptors: impl IntoIterator<Item = ToolDescriptor>) -> ToolResult<()> {
        for descriptor in descriptors {
            self.register(descriptor)?;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<ToolDescriptor>> {
        self.tools.read().ok()?.get(name).cloned()
    }

    /// All descriptors sorted by name.
    pub fn list(&self) -> Vec<Arc<ToolDescriptor>> {
        let mut tools: Vec<Arc<ToolDescriptor>> = self
            .tools
            .read()
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    pub fn len(&self) -> usize {
        self.tools.read().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::params::ParamSpec;
    use serde_json::json;

    fn echo() -> ToolHandler {
        handler(|_ctx, args| async move { Ok(args) })
    }

    #[test]
    fn test_register_overrides() {
        let registry = ToolRegistry::new();
        assert!(!registry
            .register(ToolDescriptor::new("read_file", "built-in", echo()))
            .unwrap());
        assert!(registry
            .register(ToolDescriptor::new("read_file", "custom", echo()).requires_project())
            .unwrap());
        let tool = registry.get("read_file").unwrap();
        assert_eq!(tool.description, "custom");
        assert!(tool.requires_project);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_rejects_bad_descriptors() {
        let registry = ToolRegistry::new();
        assert!(registry.register(ToolDescriptor::new(" ", "", echo())).is_err());
        let dup = ToolDescriptor::new("x", "", echo())
            .param(ParamSpec::string("a", ""))
            .param(ParamSpec::string("a", ""));
        assert!(registry.register(dup).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_summary_shape() {
        let summary = ToolDescriptor::new("apply_diff", "Apply a diff", echo())
            .param(ParamSpec::string("filename", "Target").required())
            .creates_checkpoint()
            .summary();
        let value = serde_json::to_value(summary).unwrap();
        assert_eq!(value["createsCheckpoint"], true);
        assert_eq!(value["parameters"]["required"], json!(["filename"]));
    }
}
