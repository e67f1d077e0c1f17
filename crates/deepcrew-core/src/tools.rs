//! Tool contract shared by every capability an agent may call.
//!
//! Tools never return `Err`: a failed invocation is still an observation the
//! calling agent reads as text, so the pipeline keeps going. The
//! [`ToolOutcome`] variant records which of the two happened.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::llm::ToolDefinition;

/// Result of a single tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "text", rename_all = "snake_case")]
pub enum ToolOutcome {
    Success(String),
    Failure(String),
}

impl ToolOutcome {
    pub fn success(text: impl Into<String>) -> Self {
        Self::Success(text.into())
    }

    pub fn failure(text: impl Into<String>) -> Self {
        Self::Failure(text.into())
    }

    /// Text handed back to the agent, regardless of outcome.
    pub fn text(&self) -> &str {
        match self {
            ToolOutcome::Success(text) | ToolOutcome::Failure(text) => text,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ToolOutcome::Failure(_))
    }

    pub fn into_text(self) -> String {
        match self {
            ToolOutcome::Success(text) | ToolOutcome::Failure(text) => text,
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON schema of the arguments object.
    fn parameters_schema(&self) -> Value;
    async fn invoke(&self, args: Value) -> ToolOutcome;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Ordered, name-addressable collection of tools.
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Add a tool, replacing any earlier tool registered under the same name.
    pub fn with(mut self, tool: Arc<dyn Tool>) -> Self {
        self.insert(tool);
        self
    }

    pub fn insert(&mut self, tool: Arc<dyn Tool>) {
        self.tools.retain(|existing| existing.name() != tool.name());
        self.tools.push(tool);
    }

    /// Union of two sets; entries of `other` win on name clashes.
    pub fn merged(&self, other: &ToolSet) -> ToolSet {
        let mut merged = self.clone();
        for tool in &other.tools {
            merged.insert(tool.clone());
        }
        merged
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|tool| tool.name() == name)
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|tool| tool.definition()).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|tool| tool.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Invoke a tool by name; unknown names degrade into a failure observation.
    pub async fn invoke(&self, name: &str, args: Value) -> ToolOutcome {
        match self.get(name) {
            Some(tool) => tool.invoke(args).await,
            None => ToolOutcome::failure(format!(
                "Tool '{name}' is not available. Available tools: {}",
                if self.is_empty() {
                    "none".to_string()
                } else {
                    self.names().join(", ")
                }
            )),
        }
    }
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
