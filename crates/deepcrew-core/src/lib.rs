//! DeepCrew core: agents, task chains and the sequential crew orchestrator.
//!
//! The crate knows nothing about research in particular. Agents are records,
//! tasks are records, and a single execution function turns them into a
//! tool-calling conversation with a language model. Concrete agent
//! definitions live in `deepcrew-agents`.

pub mod agent;
pub mod chain;
pub mod config;
pub mod error;
pub mod events;
pub mod executor;
pub mod input;
pub mod llm;
pub mod metrics;
pub mod orchestrator;
pub mod prompt;
pub mod report;
pub mod search;
pub mod security;
pub mod telemetry;
pub mod tools;

pub use agent::Agent;
pub use chain::{TaskChain, TaskId, TaskSpec};
pub use config::{Config, ConfigLoader, CrewConfig, LlmConfig, LoggingConfig, SearchConfig};
pub use error::{DeepCrewError, LlmError};
pub use events::{Event, EventCollector, TaskOutcome, drain_events};
pub use executor::{ASK_QUESTION_TOOL, Assignment, DELEGATE_WORK_TOOL, TaskExecutor};
pub use input::compose_query;
pub use llm::{
    ChatCompletionsClient, ChatMessage, ChatRole, Completion, LlmClient, ToolCall, ToolDefinition,
};
pub use orchestrator::{Crew, CrewOutput, TaskOutput};
pub use report::{ReportCheck, ReportIssue, Section, check_report};
pub use search::{
    LinkupClient, OutputType, SEARCH_TOOL_NAME, SearchDepth, SearchProvider, SearchRequest,
    SearchTool,
};
pub use security::{SecretValue, redact, require_env, require_var, sanitize_text};
pub use telemetry::{TelemetryOptions, init_telemetry};
pub use tools::{Tool, ToolOutcome, ToolSet};
