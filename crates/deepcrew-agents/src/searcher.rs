//! Web Searcher: gathers raw, citable findings for the query.

use std::sync::Arc;

use chrono::NaiveDate;
use deepcrew_core::{Agent, LlmClient, TaskSpec, ToolSet};

pub const ROLE: &str = "Web Searcher";
pub const TASK_ID: &str = "search";

const GOAL: &str = "Locate the most authoritative, up-to-date, and relevant information on the web \
to comprehensively address the research query. Ensure all findings are accompanied by accurate \
source links (urls) suitable for citation in a formal research report. Gather data, facts, and \
potential visuals (charts, diagrams, images) that could support the report's sections: Executive \
Summary, Key Findings, Visuals, Conclusion, and References.";

const BACKSTORY: &str = "A specialist in advanced web research, skilled at constructing precise \
queries and evaluating the credibility of sources. Responsible for assembling a robust set of \
resources and raw findings, with clear citations, to enable deep analysis and structured \
reporting. Passes all findings to the 'Research Analyst' for synthesis.";

const EXPECTED_OUTPUT: &str =
    "Comprehensive raw search results, including sources (urls) and any relevant visuals.";

/// Build the searcher agent around the search tool set.
pub fn web_searcher(llm: Arc<dyn LlmClient>, search: ToolSet) -> Agent {
    Agent::new(ROLE, GOAL, BACKSTORY, llm)
        .with_tools(search)
        .with_delegation(true)
}

/// First stage of the chain; the only one that sees the user's query.
pub fn search_task(query: &str, today: NaiveDate, agent: Arc<Agent>, search: ToolSet) -> TaskSpec {
    let description = format!(
        "Conduct an exhaustive web search for authoritative, up-to-date information about: {query}. \
         Collect facts, data, and potential visuals (charts, diagrams, images) relevant to the \
         research query. Ensure all findings are accompanied by accurate source links (urls) \
         suitable for citation in a formal research report. Today's date is {}.",
        today.format("%Y-%m-%d")
    );

    TaskSpec::new(TASK_ID, description, EXPECTED_OUTPUT, agent).with_tools(search)
}
