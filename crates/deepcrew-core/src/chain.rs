//! Task records and the validated chain they form.
//!
//! Tasks declare the upstream tasks whose output they need (`context`). A
//! task may only name tasks declared before it, so the dependency graph is
//! acyclic by construction and declaration order is a valid execution order.

use std::collections::HashSet;
use std::sync::Arc;

use crate::agent::Agent;
use crate::error::DeepCrewError;
use crate::tools::ToolSet;

/// Unique identifier for a task within a chain
pub type TaskId = String;

/// One stage of work bound to exactly one agent.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub id: TaskId,
    /// Instructions; already interpolated with the query where relevant.
    pub description: String,
    /// Required output shape, used as a prompt constraint only.
    pub expected_output: String,
    pub agent: Arc<Agent>,
    /// Upstream tasks whose outputs must be available before this one runs.
    pub context: Vec<TaskId>,
    /// Replaces the agent's tool set for this task when present.
    pub tools: Option<ToolSet>,
}

impl TaskSpec {
    pub fn new(
        id: impl Into<TaskId>,
        description: impl Into<String>,
        expected_output: impl Into<String>,
        agent: Arc<Agent>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            expected_output: expected_output.into(),
            agent,
            context: Vec::new(),
            tools: None,
        }
    }

    pub fn with_context(mut self, upstream: impl Into<TaskId>) -> Self {
        self.context.push(upstream.into());
        self
    }

    pub fn with_tools(mut self, tools: ToolSet) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Tools available while executing this task.
    pub fn effective_tools(&self) -> &ToolSet {
        self.tools.as_ref().unwrap_or_else(|| self.agent.tools())
    }
}

/// Ordered list of tasks with construction-time dependency validation.
#[derive(Debug, Clone, Default)]
pub struct TaskChain {
    tasks: Vec<TaskSpec>,
}

impl TaskChain {
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    /// Append a task, rejecting duplicate ids and references to tasks that
    /// are not declared earlier in the chain.
    pub fn add_task(&mut self, task: TaskSpec) -> Result<(), DeepCrewError> {
        if task.id.trim().is_empty() {
            return Err(DeepCrewError::InvalidChain(
                "task id must not be empty".to_string(),
            ));
        }
        if self.position(&task.id).is_some() {
            return Err(DeepCrewError::InvalidChain(format!(
                "task '{}' already exists",
                task.id
            )));
        }

        let mut seen = HashSet::new();
        for upstream in &task.context {
            if upstream == &task.id {
                return Err(DeepCrewError::InvalidChain(format!(
                    "task '{}' lists itself as context",
                    task.id
                )));
            }
            if !seen.insert(upstream) {
                return Err(DeepCrewError::InvalidChain(format!(
                    "task '{}' lists context '{}' twice",
                    task.id, upstream
                )));
            }
            if self.position(upstream).is_none() {
                return Err(DeepCrewError::InvalidChain(format!(
                    "context '{}' for task '{}' is not declared before it",
                    upstream, task.id
                )));
            }
        }

        self.tasks.push(task);
        Ok(())
    }

    pub fn then(mut self, task: TaskSpec) -> Result<Self, DeepCrewError> {
        self.add_task(task)?;
        Ok(self)
    }

    /// Assert the chain is strictly linear: the first task has no context and
    /// every later task depends on exactly its immediate predecessor.
    pub fn ensure_strict_chain(&self) -> Result<(), DeepCrewError> {
        let Some(first) = self.tasks.first() else {
            return Err(DeepCrewError::InvalidChain("chain has no tasks".to_string()));
        };
        if !first.context.is_empty() {
            return Err(DeepCrewError::InvalidChain(format!(
                "first task '{}' must not declare context",
                first.id
            )));
        }

        for pair in self.tasks.windows(2) {
            let (previous, current) = (&pair[0], &pair[1]);
            if current.context.len() != 1 || current.context[0] != previous.id {
                return Err(DeepCrewError::InvalidChain(format!(
                    "task '{}' must depend on exactly '{}' (declared: [{}])",
                    current.id,
                    previous.id,
                    current.context.join(", ")
                )));
            }
        }

        Ok(())
    }

    pub fn tasks(&self) -> &[TaskSpec] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&TaskSpec> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.tasks.iter().position(|task| task.id == id)
    }

    pub fn ids(&self) -> Vec<TaskId> {
        self.tasks.iter().map(|task| task.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
