//! Crew orchestrator executing a task chain strictly in declaration order.
//!
//! Every stage becomes a `graph_flow` task wired to its successor by a single
//! edge. A stage stores its raw output in the session context under its own
//! id; the next stage reads the outputs named in its `context` list from
//! there. There is no retry and no parallelism: the first failing stage ends
//! the run.

use anyhow::anyhow;
use async_trait::async_trait;
use graph_flow::{
    Context, ExecutionStatus, FlowRunner, Graph, GraphBuilder, InMemorySessionStorage, NextAction,
    Session, SessionStorage, Task, TaskResult,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, debug, error, info, info_span};
use uuid::Uuid;

use crate::agent::Agent;
use crate::chain::{TaskChain, TaskId, TaskSpec};
use crate::config::CrewConfig;
use crate::error::DeepCrewError;
use crate::events::{EventCollector, TaskOutcome};
use crate::executor::{Assignment, TaskExecutor};
use crate::metrics;
use crate::prompt::render_context;

const FAILURE_KEY: &str = "crew.failure";

fn output_key(task_id: &str) -> String {
    format!("stage.{task_id}.output")
}

/// Raw output of one completed stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskOutput {
    pub task_id: TaskId,
    pub agent_role: String,
    pub raw: String,
}

/// Result of a successful crew run.
#[derive(Debug, Clone, Serialize)]
pub struct CrewOutput {
    /// Output of the last stage.
    pub raw: String,
    /// Per-stage outputs in execution order.
    pub tasks: Vec<TaskOutput>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StageFailure {
    stage: String,
    reason: String,
}

/// A set of agents plus the strictly linear chain of tasks they execute.
pub struct Crew {
    agents: Vec<Arc<Agent>>,
    chain: TaskChain,
    graph: Arc<Graph>,
}

impl Crew {
    /// Build a crew; the chain must be strictly linear.
    pub fn new(
        agents: Vec<Arc<Agent>>,
        chain: TaskChain,
        config: &CrewConfig,
        events: EventCollector,
    ) -> Result<Self, DeepCrewError> {
        chain.ensure_strict_chain()?;
        for task in chain.tasks() {
            if !agents.iter().any(|agent| agent.role() == task.agent.role()) {
                return Err(DeepCrewError::InvalidChain(format!(
                    "task '{}' is assigned to '{}', which is not a member of the crew",
                    task.id,
                    task.agent.role()
                )));
            }
        }

        let executor = TaskExecutor::new(config, events.clone());
        let graph = build_graph(&chain, &agents, &executor, &events);

        Ok(Self {
            agents,
            chain,
            graph,
        })
    }

    pub fn agents(&self) -> &[Arc<Agent>] {
        &self.agents
    }

    pub fn chain(&self) -> &TaskChain {
        &self.chain
    }

    /// Run every stage once, in order, and return the final stage's output.
    ///
    /// Any stage error is reported as [`DeepCrewError::StageFailed`] naming
    /// the stage; outputs of earlier stages are discarded.
    pub async fn kickoff(&self) -> Result<CrewOutput, DeepCrewError> {
        let run_start = Instant::now();
        info!(stages = self.chain.len(), "crew kickoff");

        let Some(first) = self.chain.tasks().first() else {
            return Err(DeepCrewError::InvalidChain("chain has no tasks".to_string()));
        };

        let storage = Arc::new(InMemorySessionStorage::new());
        let runner = FlowRunner::new(self.graph.clone(), storage.clone());

        let session_id = format!("crew-{}", Uuid::new_v4());
        let session = Session::new_from_task(session_id.clone(), &first.id);
        storage
            .save(session)
            .await
            .map_err(|err| anyhow!("failed to persist crew session: {err}"))?;

        loop {
            let result = runner
                .run(&session_id)
                .await
                .map_err(|err| anyhow!("graph execution failure: {err}"))?;

            match result.status {
                ExecutionStatus::Completed => break,
                ExecutionStatus::WaitingForInput => continue,
                ExecutionStatus::Error(message) => return Err(anyhow!(message).into()),
            }
        }

        let session = storage
            .get(&session_id)
            .await
            .map_err(|err| anyhow!("failed to reload crew session: {err}"))?
            .ok_or_else(|| anyhow!("crew session missing after execution"))?;

        if let Some(failure) = session.context.get::<StageFailure>(FAILURE_KEY).await {
            return Err(DeepCrewError::StageFailed {
                stage: failure.stage,
                reason: failure.reason,
            });
        }

        let mut outputs: Vec<TaskOutput> = Vec::with_capacity(self.chain.len());
        for task in self.chain.tasks() {
            let raw: String = session
                .context
                .get(&output_key(&task.id))
                .await
                .ok_or_else(|| anyhow!("stage '{}' recorded no output", task.id))?;
            outputs.push(TaskOutput {
                task_id: task.id.clone(),
                agent_role: task.agent.role().to_string(),
                raw,
            });
        }

        let raw = outputs
            .last()
            .map(|output| output.raw.clone())
            .unwrap_or_default();

        info!(
            duration_ms = run_start.elapsed().as_millis() as u64,
            chars = raw.len(),
            "crew finished"
        );

        Ok(CrewOutput {
            raw,
            tasks: outputs,
        })
    }
}

impl std::fmt::Debug for Crew {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crew")
            .field("agents", &self.agents)
            .field("tasks", &self.chain.ids())
            .finish()
    }
}

fn build_graph(
    chain: &TaskChain,
    agents: &[Arc<Agent>],
    executor: &TaskExecutor,
    events: &EventCollector,
) -> Arc<Graph> {
    let tasks = chain.tasks();
    let mut builder = GraphBuilder::new("deepcrew_chain");

    for (index, spec) in tasks.iter().enumerate() {
        builder = builder.add_task(Arc::new(StageTask {
            spec: spec.clone(),
            executor: executor.clone(),
            coworkers: agents.to_vec(),
            events: events.clone(),
            is_last: index + 1 == tasks.len(),
        }));
    }
    for pair in tasks.windows(2) {
        builder = builder.add_edge(&pair[0].id, &pair[1].id);
    }
    if let Some(first) = tasks.first() {
        builder = builder.set_start_task(&first.id);
    }

    Arc::new(builder.build())
}

/// One stage of the chain as a graph node.
struct StageTask {
    spec: TaskSpec,
    executor: TaskExecutor,
    coworkers: Vec<Arc<Agent>>,
    events: EventCollector,
    is_last: bool,
}

impl StageTask {
    async fn upstream_context(&self, context: &Context) -> Option<String> {
        if self.spec.context.is_empty() {
            return None;
        }
        let mut upstream: Vec<(String, String)> = Vec::with_capacity(self.spec.context.len());
        for id in &self.spec.context {
            if let Some(raw) = context.get::<String>(&output_key(id)).await {
                upstream.push((id.clone(), raw));
            }
        }
        Some(render_context(
            upstream
                .iter()
                .map(|(id, raw)| (id.as_str(), raw.as_str())),
        ))
    }

    async fn execute(&self, upstream: Option<&str>) -> Result<String, DeepCrewError> {
        let task = &self.spec;
        let role = task.agent.role();
        self.events.emit_start(&task.id, role, &task.description);
        let started = Instant::now();

        let assignment = Assignment {
            task_id: &task.id,
            description: &task.description,
            expected_output: &task.expected_output,
            context: upstream,
        };
        let result = self
            .executor
            .execute(&task.agent, assignment, task.effective_tools(), &self.coworkers)
            .await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(raw) => {
                metrics::record_stage(&task.id, duration_ms, true);
                self.events
                    .emit_finish(&task.id, role, TaskOutcome::Success, duration_ms);
                info!(duration_ms, "stage complete");
                Ok(raw)
            }
            Err(err) => {
                let err = match err {
                    already @ DeepCrewError::StageFailed { .. } => already,
                    other => DeepCrewError::stage_failed(&task.id, other),
                };
                metrics::record_stage(&task.id, duration_ms, false);
                self.events.emit_finish(
                    &task.id,
                    role,
                    TaskOutcome::Failure {
                        reason: err.to_string(),
                    },
                    duration_ms,
                );
                error!(error = %err, duration_ms, "stage failed");
                Err(err)
            }
        }
    }
}

#[async_trait]
impl Task for StageTask {
    fn id(&self) -> &str {
        &self.spec.id
    }

    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let span = info_span!("crew.stage", stage = %self.spec.id, role = %self.spec.agent.role());

        async {
            let upstream = self.upstream_context(&context).await;
            match self.execute(upstream.as_deref()).await {
                Ok(raw) => {
                    context.set(output_key(&self.spec.id), &raw).await;
                    debug!(chars = raw.len(), "stage output stored");
                    let next = if self.is_last {
                        NextAction::End
                    } else {
                        NextAction::ContinueAndExecute
                    };
                    Ok(TaskResult::new(None, next))
                }
                Err(err) => {
                    let failure = match err {
                        DeepCrewError::StageFailed { stage, reason } => {
                            StageFailure { stage, reason }
                        }
                        other => StageFailure {
                            stage: self.spec.id.clone(),
                            reason: other.to_string(),
                        },
                    };
                    context.set(FAILURE_KEY, &failure).await;
                    Ok(TaskResult::new(None, NextAction::End))
                }
            }
        }
        .instrument(span)
        .await
    }
}
