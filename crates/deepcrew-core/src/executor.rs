//! Generic task execution: turns an agent record plus a task into a
//! tool-calling conversation with the agent's language model.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::agent::Agent;
use crate::config::CrewConfig;
use crate::error::DeepCrewError;
use crate::events::EventCollector;
use crate::llm::{ChatMessage, ToolDefinition};
use crate::metrics;
use crate::prompt::{self, EMPTY_ANSWER_RETRY, FORCE_FINAL_ANSWER};
use crate::tools::{Tool, ToolOutcome, ToolSet};

pub const DELEGATE_WORK_TOOL: &str = "delegate_work";
pub const ASK_QUESTION_TOOL: &str = "ask_question";

/// Everything the executor needs to know about the work itself.
#[derive(Debug, Clone, Copy)]
pub struct Assignment<'a> {
    /// Task id used for events; delegated work reports under its parent task.
    pub task_id: &'a str,
    pub description: &'a str,
    pub expected_output: &'a str,
    pub context: Option<&'a str>,
}

/// Runs one assignment for one agent.
#[derive(Clone)]
pub struct TaskExecutor {
    max_tool_iterations: usize,
    events: EventCollector,
}

impl TaskExecutor {
    pub fn new(config: &CrewConfig, events: EventCollector) -> Self {
        Self {
            max_tool_iterations: config.max_tool_iterations.max(1),
            events,
        }
    }

    /// Execute `assignment` with `agent`, returning its final answer.
    ///
    /// `coworkers` are the other agents of the crew; they become reachable
    /// through delegation tools only if the agent allows delegation.
    #[instrument(
        name = "task.execute",
        skip(self, agent, assignment, tools, coworkers),
        fields(task_id = %assignment.task_id, role = %agent.role())
    )]
    pub async fn execute(
        &self,
        agent: &Agent,
        assignment: Assignment<'_>,
        tools: &ToolSet,
        coworkers: &[Arc<Agent>],
    ) -> Result<String, DeepCrewError> {
        let tools = self.tools_for(agent, assignment.task_id, tools, coworkers);
        let definitions: Vec<ToolDefinition> = tools.definitions();

        let mut messages = vec![
            ChatMessage::system(prompt::system_prompt(agent, &tools)),
            ChatMessage::user(prompt::task_prompt(
                assignment.description,
                assignment.expected_output,
                assignment.context,
            )),
        ];

        let mut turns = 0usize;
        let mut nudged_empty = false;

        loop {
            let offer_tools = !definitions.is_empty() && turns < self.max_tool_iterations;
            let offered: &[ToolDefinition] = if offer_tools { &definitions } else { &[] };

            let completion = agent.llm().complete(&messages, offered).await?;
            turns += 1;

            if offer_tools && completion.wants_tools() {
                debug!(
                    turn = turns,
                    calls = completion.tool_calls.len(),
                    "agent requested tools"
                );
                messages.push(ChatMessage::assistant(
                    completion.content.clone(),
                    completion.tool_calls.clone(),
                ));

                for call in completion.tool_calls {
                    let outcome = tools.invoke(&call.name, call.arguments).await;
                    let failed = outcome.is_failure();
                    metrics::record_tool_call(&call.name, failed);
                    self.events
                        .emit_tool_call(assignment.task_id, agent.role(), &call.name, failed);
                    if failed {
                        warn!(tool = %call.name, "tool call degraded into an error observation");
                    }
                    messages.push(ChatMessage::tool_result(call.id, outcome.into_text()));
                }

                if turns >= self.max_tool_iterations {
                    info!(turns, "tool budget exhausted; forcing final answer");
                    messages.push(ChatMessage::user(FORCE_FINAL_ANSWER));
                }
                continue;
            }

            let answer = completion.content.trim();
            if !answer.is_empty() {
                info!(turns, chars = answer.len(), "agent produced final answer");
                return Ok(answer.to_string());
            }

            if nudged_empty {
                return Err(DeepCrewError::stage_failed(
                    assignment.task_id,
                    format!("{} returned an empty final answer", agent.role()),
                ));
            }
            nudged_empty = true;
            messages.push(ChatMessage::user(EMPTY_ANSWER_RETRY));
        }
    }

    fn tools_for(
        &self,
        agent: &Agent,
        task_id: &str,
        tools: &ToolSet,
        coworkers: &[Arc<Agent>],
    ) -> ToolSet {
        let peers: Vec<Arc<Agent>> = coworkers
            .iter()
            .filter(|coworker| coworker.role() != agent.role())
            .cloned()
            .collect();

        if !agent.allows_delegation() || peers.is_empty() {
            return tools.clone();
        }

        let delegation = ToolSet::new()
            .with(Arc::new(DelegationTool::new(
                DelegationKind::DelegateWork,
                self.clone(),
                peers.clone(),
                task_id,
                agent.role(),
            )))
            .with(Arc::new(DelegationTool::new(
                DelegationKind::AskQuestion,
                self.clone(),
                peers,
                task_id,
                agent.role(),
            )));
        tools.merged(&delegation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DelegationKind {
    DelegateWork,
    AskQuestion,
}

#[derive(Debug, Deserialize)]
struct DelegationArgs {
    #[serde(alias = "question")]
    task: String,
    #[serde(default)]
    context: String,
    coworker: String,
}

/// Hands an ad-hoc assignment to another agent of the same crew.
///
/// The coworker runs with its own tools but cannot delegate further.
struct DelegationTool {
    kind: DelegationKind,
    executor: TaskExecutor,
    coworkers: Vec<Arc<Agent>>,
    parent_task: String,
    from_role: String,
    description: String,
}

impl DelegationTool {
    fn new(
        kind: DelegationKind,
        executor: TaskExecutor,
        coworkers: Vec<Arc<Agent>>,
        parent_task: &str,
        from_role: &str,
    ) -> Self {
        let roster = coworkers
            .iter()
            .map(|agent| agent.role())
            .collect::<Vec<_>>()
            .join(", ");
        let description = match kind {
            DelegationKind::DelegateWork => format!(
                "Delegate a specific task to one of the following coworkers: {roster}. \
                 The coworker knows nothing about your work, so share all context needed."
            ),
            DelegationKind::AskQuestion => format!(
                "Ask a specific question to one of the following coworkers: {roster}. \
                 The coworker knows nothing about your work, so share all context needed."
            ),
        };

        Self {
            kind,
            executor,
            coworkers,
            parent_task: parent_task.to_string(),
            from_role: from_role.to_string(),
            description,
        }
    }

    fn find(&self, name: &str) -> Option<&Arc<Agent>> {
        let wanted = name.trim().trim_matches('"').to_lowercase();
        self.coworkers
            .iter()
            .find(|agent| agent.role().to_lowercase() == wanted)
    }
}

#[async_trait]
impl Tool for DelegationTool {
    fn name(&self) -> &str {
        match self.kind {
            DelegationKind::DelegateWork => DELEGATE_WORK_TOOL,
            DelegationKind::AskQuestion => ASK_QUESTION_TOOL,
        }
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        let (field, about) = match self.kind {
            DelegationKind::DelegateWork => ("task", "The task to delegate"),
            DelegationKind::AskQuestion => ("question", "The question to ask"),
        };
        let roles: Vec<&str> = self.coworkers.iter().map(|agent| agent.role()).collect();
        json!({
            "type": "object",
            "properties": {
                field: {"type": "string", "description": about},
                "context": {
                    "type": "string",
                    "description": "Everything the coworker needs to know to help"
                },
                "coworker": {
                    "type": "string",
                    "enum": roles,
                    "description": "Role of the coworker to ask"
                }
            },
            "required": [field, "context", "coworker"]
        })
    }

    async fn invoke(&self, args: Value) -> ToolOutcome {
        let args: DelegationArgs = match serde_json::from_value(args) {
            Ok(args) => args,
            Err(err) => {
                return ToolOutcome::failure(format!(
                    "Error executing tool. Invalid arguments: {err}"
                ));
            }
        };

        let Some(coworker) = self.find(&args.coworker) else {
            let options = self
                .coworkers
                .iter()
                .map(|agent| format!("- {}", agent.role()))
                .collect::<Vec<_>>()
                .join("\n");
            return ToolOutcome::failure(format!(
                "Error executing tool. Coworker '{}' not found, it must be one of the following options:\n{options}",
                args.coworker
            ));
        };

        self.executor
            .events
            .emit_delegation(&self.parent_task, &self.from_role, coworker.role());
        info!(from = %self.from_role, to = %coworker.role(), "delegating work");

        let expected_output = match self.kind {
            DelegationKind::DelegateWork => {
                "Your best answer to your coworker asking you this, accounting for the context shared."
            }
            DelegationKind::AskQuestion => {
                "A direct, sourced answer to your coworker's question, accounting for the context shared."
            }
        };
        let assignment = Assignment {
            task_id: &self.parent_task,
            description: &args.task,
            expected_output,
            context: Some(args.context.as_str()),
        };

        match self
            .executor
            .execute(coworker, assignment, coworker.tools(), &[])
            .await
        {
            Ok(answer) => ToolOutcome::success(answer),
            Err(err) => ToolOutcome::failure(format!("Error executing tool. {err}")),
        }
    }
}
