//! Lifecycle event bus for a single crew run.
//!
//! The orchestrator and executor emit events as stages start and finish and
//! as agents call tools; the caller drains them once the run is over.

use crate::chain::TaskId;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

/// Unique identifier for an event
pub type EventId = String;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Task execution started
    Start {
        event_id: EventId,
        timestamp: i64,
        task_id: TaskId,
        role: String,
        description: String,
    },
    /// Task execution finished
    Finish {
        event_id: EventId,
        timestamp: i64,
        task_id: TaskId,
        role: String,
        outcome: TaskOutcome,
        duration_ms: u64,
    },
    /// An agent invoked a tool
    ToolCall {
        event_id: EventId,
        timestamp: i64,
        task_id: TaskId,
        role: String,
        tool: String,
        failed: bool,
    },
    /// An agent handed work to a coworker
    Delegation {
        event_id: EventId,
        timestamp: i64,
        task_id: TaskId,
        from_role: String,
        coworker: String,
    },
}

impl Event {
    pub fn task_id(&self) -> &TaskId {
        match self {
            Event::Start { task_id, .. }
            | Event::Finish { task_id, .. }
            | Event::ToolCall { task_id, .. }
            | Event::Delegation { task_id, .. } => task_id,
        }
    }
}

/// Outcome of a task execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOutcome {
    Success,
    Failure { reason: String },
}

/// Sending half of the event bus; cheap to clone.
#[derive(Clone)]
pub struct EventCollector {
    sender: mpsc::UnboundedSender<Event>,
}

impl EventCollector {
    /// Create a new event collector
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn emit_start(&self, task_id: &str, role: &str, description: &str) {
        self.send(Event::Start {
            event_id: generate_event_id(),
            timestamp: current_timestamp(),
            task_id: task_id.to_string(),
            role: role.to_string(),
            description: description.to_string(),
        });
    }

    pub fn emit_finish(&self, task_id: &str, role: &str, outcome: TaskOutcome, duration_ms: u64) {
        self.send(Event::Finish {
            event_id: generate_event_id(),
            timestamp: current_timestamp(),
            task_id: task_id.to_string(),
            role: role.to_string(),
            outcome,
            duration_ms,
        });
    }

    pub fn emit_tool_call(&self, task_id: &str, role: &str, tool: &str, failed: bool) {
        self.send(Event::ToolCall {
            event_id: generate_event_id(),
            timestamp: current_timestamp(),
            task_id: task_id.to_string(),
            role: role.to_string(),
            tool: tool.to_string(),
            failed,
        });
    }

    pub fn emit_delegation(&self, task_id: &str, from_role: &str, coworker: &str) {
        self.send(Event::Delegation {
            event_id: generate_event_id(),
            timestamp: current_timestamp(),
            task_id: task_id.to_string(),
            from_role: from_role.to_string(),
            coworker: coworker.to_string(),
        });
    }

    fn send(&self, event: Event) {
        // A dropped receiver only means nobody is interested in the trace.
        if let Err(e) = self.sender.send(event) {
            tracing::trace!(error = %e, "event receiver dropped");
        }
    }
}

impl Default for EventCollector {
    fn default() -> Self {
        Self::new().0
    }
}

/// Drain every event already buffered in the channel without waiting.
pub fn drain_events(receiver: &mut mpsc::UnboundedReceiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

fn generate_event_id() -> EventId {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let id = COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("evt_{}", id)
}

/// Current Unix timestamp in milliseconds
fn current_timestamp() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
