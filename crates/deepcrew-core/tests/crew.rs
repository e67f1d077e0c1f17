use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};

use deepcrew_core::{
    Agent, ChatMessage, ChatRole, Completion, Crew, CrewConfig, DELEGATE_WORK_TOOL,
    DeepCrewError, Event, EventCollector, LlmClient, LlmError, SearchProvider, SearchRequest,
    SearchTool, TaskChain, TaskOutcome, TaskSpec, ToolCall, ToolDefinition, ToolSet,
    drain_events,
};

type Script = dyn Fn(&[ChatMessage], &[ToolDefinition]) -> Result<Completion, LlmError> + Send + Sync;

/// LLM stand-in driven by a closure; keeps every request it receives.
struct ScriptedLlm {
    script: Box<Script>,
    calls: AtomicUsize,
    requests: std::sync::Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedLlm {
    fn new<F>(script: F) -> Arc<Self>
    where
        F: Fn(&[ChatMessage], &[ToolDefinition]) -> Result<Completion, LlmError>
            + Send
            + Sync
            + 'static,
    {
        Arc::new(Self {
            script: Box::new(script),
            calls: AtomicUsize::new(0),
            requests: std::sync::Mutex::new(Vec::new()),
        })
    }

    fn answering(text: &'static str) -> Arc<Self> {
        Self::new(move |_, _| Ok(Completion::text(text)))
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_user_prompt(&self) -> String {
        let requests = self.requests.lock().unwrap();
        requests
            .last()
            .and_then(|messages| messages.iter().find(|m| m.role == ChatRole::User))
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }

    fn tool_observations(&self) -> Vec<String> {
        let requests = self.requests.lock().unwrap();
        requests
            .last()
            .map(|messages| {
                messages
                    .iter()
                    .filter(|m| m.role == ChatRole::Tool)
                    .map(|m| m.content.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<Completion, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(messages.to_vec());
        (self.script)(messages, tools)
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

struct DownProvider;

#[async_trait]
impl SearchProvider for DownProvider {
    async fn search(&self, _request: &SearchRequest) -> anyhow::Result<Value> {
        Err(anyhow::anyhow!("503 Service Unavailable"))
    }
}

fn tool_call(id: &str, name: &str, arguments: Value) -> Completion {
    Completion {
        content: String::new(),
        tool_calls: vec![ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments,
        }],
    }
}

fn has_tool_result(messages: &[ChatMessage]) -> bool {
    messages.iter().any(|m| m.role == ChatRole::Tool)
}

fn agent(role: &str, llm: Arc<ScriptedLlm>) -> Arc<Agent> {
    Arc::new(Agent::new(role, format!("{role} goal"), format!("{role} backstory"), llm))
}

fn three_stage_chain(
    searcher: &Arc<Agent>,
    analyst: &Arc<Agent>,
    writer: &Arc<Agent>,
) -> TaskChain {
    TaskChain::new()
        .then(TaskSpec::new("search", "search the topic", "raw findings", searcher.clone()))
        .and_then(|chain| {
            chain.then(
                TaskSpec::new("analyze", "analyze findings", "notes", analyst.clone())
                    .with_context("search"),
            )
        })
        .and_then(|chain| {
            chain.then(
                TaskSpec::new("write", "write the report", "markdown", writer.clone())
                    .with_context("analyze"),
            )
        })
        .expect("valid chain")
}

#[tokio::test]
async fn stages_run_in_order_and_forward_context() {
    let searcher_llm = ScriptedLlm::answering("SEARCH-OUT");
    let analyst_llm = ScriptedLlm::answering("ANALYZE-OUT");
    let writer_llm = ScriptedLlm::answering("WRITE-OUT");
    let searcher = agent("Web Searcher", searcher_llm.clone());
    let analyst = agent("Research Analyst", analyst_llm.clone());
    let writer = agent("Technical Writer", writer_llm.clone());

    let (events, mut receiver) = EventCollector::new();
    let crew = Crew::new(
        vec![searcher.clone(), analyst.clone(), writer.clone()],
        three_stage_chain(&searcher, &analyst, &writer),
        &CrewConfig::default(),
        events,
    )
    .expect("crew");

    let output = crew.kickoff().await.expect("run succeeds");
    assert_eq!(output.raw, "WRITE-OUT");
    let ids: Vec<&str> = output.tasks.iter().map(|t| t.task_id.as_str()).collect();
    assert_eq!(ids, ["search", "analyze", "write"]);

    assert!(!searcher_llm.last_user_prompt().contains("context you're working with"));
    assert!(analyst_llm.last_user_prompt().contains("SEARCH-OUT"));
    let writer_prompt = writer_llm.last_user_prompt();
    assert!(writer_prompt.contains("ANALYZE-OUT"));
    assert!(!writer_prompt.contains("SEARCH-OUT"));

    let lifecycle: Vec<(String, &str)> = drain_events(&mut receiver)
        .iter()
        .filter_map(|event| match event {
            Event::Start { task_id, .. } => Some((task_id.clone(), "start")),
            Event::Finish { task_id, .. } => Some((task_id.clone(), "finish")),
            _ => None,
        })
        .collect();
    let expected: Vec<(String, &str)> = ["search", "analyze", "write"]
        .iter()
        .flat_map(|id| [(id.to_string(), "start"), (id.to_string(), "finish")])
        .collect();
    assert_eq!(lifecycle, expected);
}

#[tokio::test]
async fn failed_search_is_an_observation_not_an_error() {
    let searcher_llm = ScriptedLlm::new(|messages, _tools| {
        if has_tool_result(messages) {
            Ok(Completion::text("No results were available."))
        } else {
            Ok(tool_call("call_1", "linkup_search", json!({"query": "rust"})))
        }
    });
    let searcher = Arc::new(
        Agent::new("Web Searcher", "find", "searches", searcher_llm.clone()).with_tools(
            ToolSet::new().with(Arc::new(SearchTool::new(Arc::new(DownProvider)))),
        ),
    );
    let analyst = agent("Research Analyst", ScriptedLlm::answering("notes"));
    let writer = agent("Technical Writer", ScriptedLlm::answering("# Research Report"));

    let (events, mut receiver) = EventCollector::new();
    let crew = Crew::new(
        vec![searcher.clone(), analyst.clone(), writer.clone()],
        three_stage_chain(&searcher, &analyst, &writer),
        &CrewConfig::default(),
        events,
    )
    .unwrap();

    let output = crew.kickoff().await.expect("search failure must not abort the run");
    assert_eq!(output.raw, "# Research Report");

    let observations = searcher_llm.tool_observations();
    assert_eq!(observations.len(), 1);
    assert!(observations[0].starts_with("Error occurred while searching:"));

    let events = drain_events(&mut receiver);
    assert!(events.iter().any(|event| matches!(
        event,
        Event::ToolCall { tool, failed: true, .. } if tool == "linkup_search"
    )));
}

#[tokio::test]
async fn llm_failure_names_the_stage_and_stops_the_chain() {
    let searcher = agent("Web Searcher", ScriptedLlm::answering("results"));
    let analyst = agent(
        "Research Analyst",
        ScriptedLlm::new(|_, _| {
            Err(LlmError::Status {
                status: 500,
                body: "backend down".to_string(),
            })
        }),
    );
    let writer_llm = ScriptedLlm::answering("never");
    let writer = agent("Technical Writer", writer_llm.clone());

    let (events, mut receiver) = EventCollector::new();
    let crew = Crew::new(
        vec![searcher.clone(), analyst.clone(), writer.clone()],
        three_stage_chain(&searcher, &analyst, &writer),
        &CrewConfig::default(),
        events,
    )
    .unwrap();

    match crew.kickoff().await {
        Err(DeepCrewError::StageFailed { stage, reason }) => {
            assert_eq!(stage, "analyze");
            assert!(reason.contains("500"), "reason: {reason}");
        }
        other => panic!("expected stage failure, got {other:?}"),
    }
    assert_eq!(writer_llm.calls(), 0);

    let events = drain_events(&mut receiver);
    assert!(events.iter().any(|event| matches!(
        event,
        Event::Finish { task_id, outcome: TaskOutcome::Failure { .. }, .. } if task_id == "analyze"
    )));
    assert!(!events.iter().any(|event| event.task_id() == "write"));
}

#[tokio::test]
async fn tool_budget_forces_a_final_answer() {
    let llm = ScriptedLlm::new(|_messages, tools| {
        if tools.is_empty() {
            Ok(Completion::text("forced answer"))
        } else {
            Ok(tool_call("call", "linkup_search", json!({"query": "again"})))
        }
    });
    let searcher = Arc::new(
        Agent::new("Web Searcher", "find", "searches", llm.clone()).with_tools(
            ToolSet::new().with(Arc::new(SearchTool::new(Arc::new(DownProvider)))),
        ),
    );
    let chain = TaskChain::new()
        .then(TaskSpec::new("search", "search", "results", searcher.clone()))
        .unwrap();

    let crew = Crew::new(
        vec![searcher],
        chain,
        &CrewConfig {
            max_tool_iterations: 3,
        },
        EventCollector::default(),
    )
    .unwrap();

    let output = crew.kickoff().await.unwrap();
    assert_eq!(output.raw, "forced answer");
    assert_eq!(llm.calls(), 4);
}

#[tokio::test]
async fn empty_answer_is_retried_once() {
    let flaky = ScriptedLlm::new(|messages, _| {
        if messages.len() > 2 {
            Ok(Completion::text("second try"))
        } else {
            Ok(Completion::text("   "))
        }
    });
    let writer = agent("Technical Writer", flaky.clone());
    let chain = TaskChain::new()
        .then(TaskSpec::new("write", "write", "markdown", writer.clone()))
        .unwrap();
    let crew = Crew::new(vec![writer], chain, &CrewConfig::default(), EventCollector::default())
        .unwrap();
    assert_eq!(crew.kickoff().await.unwrap().raw, "second try");
    assert_eq!(flaky.calls(), 2);

    let silent = ScriptedLlm::answering("");
    let writer = agent("Technical Writer", silent.clone());
    let chain = TaskChain::new()
        .then(TaskSpec::new("write", "write", "markdown", writer.clone()))
        .unwrap();
    let crew = Crew::new(vec![writer], chain, &CrewConfig::default(), EventCollector::default())
        .unwrap();
    let err = crew.kickoff().await.unwrap_err();
    assert!(matches!(err, DeepCrewError::StageFailed { ref stage, .. } if stage == "write"));
    assert_eq!(silent.calls(), 2);
}

#[tokio::test]
async fn delegation_reaches_coworker_without_further_delegation() {
    let coworker_llm = ScriptedLlm::new(|_messages, tools| {
        assert!(
            tools.iter().all(|tool| tool.name != DELEGATE_WORK_TOOL),
            "coworkers must not delegate again"
        );
        Ok(Completion::text("coworker confirms the figure"))
    });
    let analyst_llm = ScriptedLlm::new(|messages, tools| {
        if has_tool_result(messages) {
            let observation = messages
                .iter()
                .rev()
                .find(|m| m.role == ChatRole::Tool)
                .map(|m| m.content.clone())
                .unwrap_or_default();
            return Ok(Completion::text(format!("final: {observation}")));
        }
        assert!(tools.iter().any(|tool| tool.name == DELEGATE_WORK_TOOL));
        Ok(tool_call(
            "d1",
            DELEGATE_WORK_TOOL,
            json!({"task": "verify the figure", "context": "figure is 42", "coworker": "web searcher"}),
        ))
    });

    let searcher = Arc::new(
        Agent::new("Web Searcher", "find", "searches", coworker_llm.clone()).with_delegation(true),
    );
    let analyst = Arc::new(
        Agent::new("Research Analyst", "analyze", "analyzes", analyst_llm.clone())
            .with_delegation(true),
    );
    let chain = TaskChain::new()
        .then(TaskSpec::new("analyze", "analyze", "notes", analyst.clone()))
        .unwrap();

    let (events, mut receiver) = EventCollector::new();
    let crew = Crew::new(vec![searcher, analyst], chain, &CrewConfig::default(), events).unwrap();

    let output = crew.kickoff().await.unwrap();
    assert_eq!(output.raw, "final: coworker confirms the figure");
    assert_eq!(coworker_llm.calls(), 1);
    assert!(coworker_llm.last_user_prompt().contains("figure is 42"));

    let events = drain_events(&mut receiver);
    assert!(events.iter().any(|event| matches!(
        event,
        Event::Delegation { coworker, .. } if coworker == "Web Searcher"
    )));
}

#[tokio::test]
async fn unknown_coworker_is_a_failure_observation() {
    let analyst_llm = ScriptedLlm::new(|messages, _tools| {
        if has_tool_result(messages) {
            Ok(Completion::text("carried on alone"))
        } else {
            Ok(tool_call(
                "d1",
                DELEGATE_WORK_TOOL,
                json!({"task": "t", "context": "c", "coworker": "Astrologer"}),
            ))
        }
    });
    let searcher = agent("Web Searcher", ScriptedLlm::answering("unused"));
    let analyst = Arc::new(
        Agent::new("Research Analyst", "analyze", "analyzes", analyst_llm.clone())
            .with_delegation(true),
    );
    let chain = TaskChain::new()
        .then(TaskSpec::new("analyze", "analyze", "notes", analyst.clone()))
        .unwrap();
    let crew = Crew::new(
        vec![searcher, analyst],
        chain,
        &CrewConfig::default(),
        EventCollector::default(),
    )
    .unwrap();

    assert_eq!(crew.kickoff().await.unwrap().raw, "carried on alone");
    let observations = analyst_llm.tool_observations();
    assert!(observations[0].contains("must be one of the following options"));
    assert!(observations[0].contains("- Web Searcher"));
}

#[test]
fn crew_rejects_non_linear_chain_and_foreign_agents() {
    let searcher = agent("Web Searcher", ScriptedLlm::answering("a"));
    let analyst = agent("Research Analyst", ScriptedLlm::answering("b"));
    let writer = agent("Technical Writer", ScriptedLlm::answering("c"));

    let mut skipping = TaskChain::new();
    skipping
        .add_task(TaskSpec::new("search", "s", "o", searcher.clone()))
        .unwrap();
    skipping
        .add_task(TaskSpec::new("analyze", "a", "o", analyst.clone()).with_context("search"))
        .unwrap();
    skipping
        .add_task(TaskSpec::new("write", "w", "o", writer.clone()).with_context("search"))
        .unwrap();
    let err = Crew::new(
        vec![searcher.clone(), analyst.clone(), writer.clone()],
        skipping,
        &CrewConfig::default(),
        EventCollector::default(),
    )
    .unwrap_err();
    assert!(matches!(err, DeepCrewError::InvalidChain(_)));

    let err = Crew::new(
        vec![searcher.clone(), analyst.clone()],
        three_stage_chain(&searcher, &analyst, &writer),
        &CrewConfig::default(),
        EventCollector::default(),
    )
    .unwrap_err();
    assert!(err.to_string().contains("not a member of the crew"));
}

#[tokio::test]
async fn each_kickoff_starts_from_a_fresh_session() {
    let searcher_llm = ScriptedLlm::answering("SEARCH-OUT");
    let writer_llm = ScriptedLlm::answering("WRITE-OUT");
    let searcher = agent("Web Searcher", searcher_llm.clone());
    let analyst = agent("Research Analyst", ScriptedLlm::answering("ANALYZE-OUT"));
    let writer = agent("Technical Writer", writer_llm.clone());

    let crew = Crew::new(
        vec![searcher.clone(), analyst.clone(), writer.clone()],
        three_stage_chain(&searcher, &analyst, &writer),
        &CrewConfig::default(),
        EventCollector::default(),
    )
    .unwrap();

    let first = crew.kickoff().await.expect("first run");
    let second = crew.kickoff().await.expect("second run");

    assert_eq!(first.tasks, second.tasks);
    assert_eq!(searcher_llm.calls(), 2);
    assert_eq!(writer_llm.calls(), 2);
    let raw: Vec<&str> = second.tasks.iter().map(|t| t.raw.as_str()).collect();
    assert_eq!(raw, ["SEARCH-OUT", "ANALYZE-OUT", "WRITE-OUT"]);
}
