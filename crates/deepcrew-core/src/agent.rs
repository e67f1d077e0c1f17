use std::sync::Arc;

use crate::llm::LlmClient;
use crate::tools::ToolSet;

/// Role-scoped prompt configuration bound to a single language-model client.
///
/// Agents carry no behaviour of their own; the executor turns them into
/// prompts. Fields are fixed at construction.
#[derive(Clone)]
pub struct Agent {
    role: String,
    goal: String,
    backstory: String,
    tools: ToolSet,
    allow_delegation: bool,
    llm: Arc<dyn LlmClient>,
}

impl Agent {
    pub fn new(
        role: impl Into<String>,
        goal: impl Into<String>,
        backstory: impl Into<String>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            role: role.into(),
            goal: goal.into(),
            backstory: backstory.into(),
            tools: ToolSet::new(),
            allow_delegation: false,
            llm,
        }
    }

    pub fn with_tools(mut self, tools: ToolSet) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_delegation(mut self, allow: bool) -> Self {
        self.allow_delegation = allow;
        self
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    pub fn backstory(&self) -> &str {
        &self.backstory
    }

    pub fn tools(&self) -> &ToolSet {
        &self.tools
    }

    pub fn allows_delegation(&self) -> bool {
        self.allow_delegation
    }

    pub fn llm(&self) -> &Arc<dyn LlmClient> {
        &self.llm
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("role", &self.role)
            .field("tools", &self.tools)
            .field("allow_delegation", &self.allow_delegation)
            .field("model", &self.llm.model_name())
            .finish()
    }
}
