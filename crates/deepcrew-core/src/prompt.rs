//! Prompt construction from agent and task records.

use std::fmt::Write as _;

use crate::agent::Agent;
use crate::tools::ToolSet;

/// System message describing who the agent is.
pub fn system_prompt(agent: &Agent, tools: &ToolSet) -> String {
    let mut prompt = format!(
        "You are {}. {}\nYour personal goal is: {}",
        agent.role(),
        agent.backstory(),
        agent.goal()
    );

    if tools.is_empty() {
        prompt.push_str(
            "\n\nYou have no tools. Work only from the task description and the context you are given.",
        );
    } else {
        let _ = write!(
            prompt,
            "\n\nYou may call these tools: {}. A tool result that starts with \"Error\" \
             means the call failed; you may retry with different arguments or continue \
             with what you already have.",
            tools.names().join(", ")
        );
    }

    prompt.push_str(
        "\n\nWhen you are done, reply with your complete final answer as plain text, \
         without calling any tool.",
    );
    prompt
}

/// User message for one task, including upstream context when present.
pub fn task_prompt(description: &str, expected_output: &str, context: Option<&str>) -> String {
    let mut prompt = format!(
        "Current Task: {description}\n\n\
         This is the expected criteria for your final answer: {expected_output}\n\
         You MUST return the actual complete content as the final answer, not a summary."
    );

    if let Some(context) = context.filter(|text| !text.trim().is_empty()) {
        let _ = write!(
            prompt,
            "\n\nThis is the context you're working with:\n{context}"
        );
    }

    prompt
}

/// Join upstream task outputs into one context block, in chain order.
pub fn render_context<'a, I>(outputs: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    outputs
        .into_iter()
        .map(|(task_id, raw)| format!("--- Output of task '{task_id}' ---\n{raw}"))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Nudge sent once the tool budget for a task is spent.
pub const FORCE_FINAL_ANSWER: &str = "You have reached the maximum number of tool calls for this \
task. Do not call any more tools. Using only the information gathered so far, give your complete \
final answer now.";

/// Nudge sent when the model answered with neither text nor tool calls.
pub const EMPTY_ANSWER_RETRY: &str =
    "Your last reply was empty. Provide your complete final answer now.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_prompt_includes_context_only_when_present() {
        let without = task_prompt("Search X", "raw results", None);
        assert!(without.starts_with("Current Task: Search X"));
        assert!(!without.contains("context you're working with"));

        let blank = task_prompt("Search X", "raw results", Some("   "));
        assert!(!blank.contains("context you're working with"));

        let with = task_prompt("Analyze", "notes", Some("findings [1]"));
        assert!(with.contains("This is the context you're working with:\nfindings [1]"));
        assert!(with.contains("expected criteria for your final answer: notes"));
    }

    #[test]
    fn context_blocks_keep_order() {
        let rendered = render_context([("search", "a"), ("analyze", "b")]);
        let first = rendered.find("'search'").unwrap();
        let second = rendered.find("'analyze'").unwrap();
        assert!(first < second);
    }
}
