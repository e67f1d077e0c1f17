//! Technical Writer: presents the analyst's synthesis as the final report.

use std::sync::Arc;

use deepcrew_core::{Agent, LlmClient, TaskSpec};

use crate::analyst;

pub const ROLE: &str = "Technical Writer";
pub const TASK_ID: &str = "write";

const GOAL: &str = "Produce two outputs, each clearly separated by markdown headers, with the \
Research Report first and the Thinking Process Summary second:

## (1) Research Report
A well-structured Research Report in markdown format, with clear section headers and \
citations/source links (urls). The report must include the following sections:
1. Executive Summary (required): Brief overview of the research objective and outcome.
2. Key Findings (optional): Concise insights with citations, formatted as numbered references \
(e.g., [1], [2], etc.), matching the numbers in the References section. Each citation should use a \
number that corresponds to a source in the References section.
3. Visuals (optional): Only include this section if an actual visualization (such as an image, \
chart, diagram, or table) is generated and can be shown in the report. Do NOT include this section \
if only suggestions, descriptions, or hypothetical visuals are available. If no real visualization \
is produced, omit the Visuals section entirely.
4. Conclusion (required): Summary of key takeaways and suggested next steps.
5. References (required): A numbered list of all sources cited in the report. The numbering must \
correspond to the citation numbers used in the Key Findings section. Do NOT include 'Accessed \
[Current Date]' or any placeholder access date in the references; only include the source title, \
website, and URL.
Ensure each section is clearly labeled and written in a professional, accessible style.

## (2) Thinking Process Summary
Present the detailed Thinking Process Summary provided by the Research Analyst, which for each key \
finding or section explicitly explains which sources ([n]) contributed to each conclusion and how \
the information was combined, contrasted, or selected. Do not invent or reinterpret the reasoning; \
present it clearly and professionally.";

const BACKSTORY: &str = "An expert at structuring and communicating complex research in a clear, \
engaging, and accessible way. Responsible for transforming the analyst's synthesis into a \
polished, comprehensive Research Report, with careful attention to structure, clarity, and \
citation.";

const DESCRIPTION: &str = "Write a well-structured Research Report in markdown format, based on \
the research analysis. The report must include the following sections:
- Executive Summary (required): Brief overview of the research objective and outcome.
- Key Findings (optional): Concise insights with citations if applicable.
- Visuals (optional): Only real charts, diagrams, images or tables that support the findings.
- Conclusion (required): Summary of key takeaways and suggested next steps.
- References (required): Numbered list of sources used in the research, without access dates.
Ensure each section is clearly labeled and the writing is professional, clear, and accessible.";

const EXPECTED_OUTPUT: &str = "A markdown-formatted Research Report with all required sections, \
clear structure, and citations/source links (urls).";

/// Delegation is off for the final stage.
pub fn technical_writer(llm: Arc<dyn LlmClient>) -> Agent {
    Agent::new(ROLE, GOAL, BACKSTORY, llm).with_delegation(false)
}

pub fn writing_task(agent: Arc<Agent>) -> TaskSpec {
    TaskSpec::new(TASK_ID, DESCRIPTION, EXPECTED_OUTPUT, agent).with_context(analyst::TASK_ID)
}
