//! Research Analyst: turns raw findings into section-ready notes with a
//! citation-by-citation account of the reasoning.

use std::sync::Arc;

use deepcrew_core::{Agent, LlmClient, TaskSpec};

use crate::searcher;

pub const ROLE: &str = "Research Analyst";
pub const TASK_ID: &str = "analyze";

const GOAL: &str = "Output two sections in markdown format:

## Research Report
Prepare structured notes for each section of the Research Report: Executive Summary, Key Findings, \
Visuals, Conclusion, and References.

## Thinking Process Summary
For each key finding or section, explicitly explain which sources ([n]) contributed to each \
conclusion and how the information was combined, contrasted, or selected. Provide reasoning for \
each major point, mapping citations to synthesis decisions, and avoid general statements. This \
output will be passed to the Technical Writer for final presentation.";

const BACKSTORY: &str = "An expert at critical analysis, fact-checking, and synthesis. Skilled in \
transforming unstructured data into actionable insights and structured outlines. Responsible for \
ensuring the accuracy and depth of findings, and for organizing content to facilitate clear, \
impactful reporting. Passes an organized, section-ready synthesis to the 'Technical Writer'.";

const DESCRIPTION: &str = "Analyze the raw search results, extract key findings, and verify facts. \
Organize insights, suggest visuals, and compile a list of references. Prepare structured notes for \
each section of the Research Report: Executive Summary, Key Findings, Visuals, Conclusion, and \
References.";

const EXPECTED_OUTPUT: &str = "A section-ready synthesis with key findings, suggested visuals, and \
a comprehensive reference list, all with citations.";

/// The analyst works only from context; it has no tools of its own.
pub fn research_analyst(llm: Arc<dyn LlmClient>) -> Agent {
    Agent::new(ROLE, GOAL, BACKSTORY, llm).with_delegation(true)
}

pub fn analysis_task(agent: Arc<Agent>) -> TaskSpec {
    TaskSpec::new(TASK_ID, DESCRIPTION, EXPECTED_OUTPUT, agent).with_context(searcher::TASK_ID)
}
