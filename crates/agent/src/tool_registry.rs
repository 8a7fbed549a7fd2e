//! Tool registry used by the agent loop to describe and dispatch tools.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use proto::{RegistryError, ToolError};
use tools::Tool;
use tracing::debug;

const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Registry of available tools
///
/// Tools keep their registration order, which is the order they are listed
/// in the prompt. The registry is immutable once shared, so independent
/// sessions can dispatch through the same `Arc<ToolRegistry>`.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    by_name: HashMap<String, usize>,
    timeout: Duration,
}

impl ToolRegistry {
    /// Creates an empty tool registry with the default per-call timeout.
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TOOL_TIMEOUT)
    }

    /// Creates an empty tool registry whose dispatches time out after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            tools: Vec::new(),
            by_name: HashMap::new(),
            timeout,
        }
    }

    /// Register a tool
    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<(), RegistryError> {
        self.register_arc(Arc::new(tool))
    }

    /// Register an already shared tool
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if self.by_name.contains_key(&name) {
            return Err(RegistryError::DuplicateToolName(name));
        }
        debug!("Registering tool: {name}");
        self.by_name.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// `(name, description)` pairs in registration order.
    pub fn describe_all(&self) -> Vec<(&str, &str)> {
        self.tools
            .iter()
            .map(|t| (t.name(), t.description()))
            .collect()
    }

    /// Returns the registered tool names in registration order.
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Whether `name` is registered and ends the turn when called.
    pub fn is_terminal(&self, name: &str) -> bool {
        self.get(name).is_some_and(|t| t.is_terminal())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool by name
    pub async fn dispatch(&self, name: &str, argument: &str) -> Result<String, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        debug!(tool = %name, "Dispatching tool");
        tokio::time::timeout(self.timeout, tool.execute(argument))
            .await
            .map_err(|_| ToolError::Timeout(self.timeout.as_secs()))?
    }

    fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.by_name.get(name).map(|&idx| &self.tools[idx])
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
