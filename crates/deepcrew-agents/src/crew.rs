//! Assembly of the three-stage research crew.

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use deepcrew_core::{
    ChatCompletionsClient, Config, Crew, CrewConfig, DeepCrewError, EventCollector, LinkupClient,
    LlmClient, SearchProvider, SearchTool, TaskChain, ToolSet,
};
use tracing::debug;

use crate::{analyst, searcher, writer};

/// Long-lived, read-only clients shared by every crew.
#[derive(Clone)]
pub struct ResearchBackends {
    pub llm: Arc<dyn LlmClient>,
    pub search: Arc<dyn SearchProvider>,
}

impl ResearchBackends {
    pub fn new(llm: Arc<dyn LlmClient>, search: Arc<dyn SearchProvider>) -> Self {
        Self { llm, search }
    }

    /// Build the HTTP clients; secrets come from the environment.
    pub fn from_config(config: &Config) -> Result<Self, DeepCrewError> {
        let llm = ChatCompletionsClient::new(&config.llm, config.llm_api_key()?)?;
        let search = LinkupClient::new(&config.search, config.search_api_key()?)?;
        Ok(Self::new(Arc::new(llm), Arc::new(search)))
    }
}

impl std::fmt::Debug for ResearchBackends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResearchBackends")
            .field("model", &self.llm.model_name())
            .finish_non_exhaustive()
    }
}

/// Fresh crew for one query, dated today.
pub fn create_research_crew(
    query: &str,
    backends: &ResearchBackends,
    config: &CrewConfig,
    events: EventCollector,
) -> Result<Crew, DeepCrewError> {
    build_research_crew(query, Local::now().date_naive(), backends, config, events)
}

/// Web Searcher, then Research Analyst, then Technical Writer; each stage
/// consumes exactly the output of the one before it.
pub fn build_research_crew(
    query: &str,
    today: NaiveDate,
    backends: &ResearchBackends,
    config: &CrewConfig,
    events: EventCollector,
) -> Result<Crew, DeepCrewError> {
    let search_tools =
        ToolSet::new().with(Arc::new(SearchTool::new(backends.search.clone())));

    let web_searcher = Arc::new(searcher::web_searcher(
        backends.llm.clone(),
        search_tools.clone(),
    ));
    let research_analyst = Arc::new(analyst::research_analyst(backends.llm.clone()));
    let technical_writer = Arc::new(writer::technical_writer(backends.llm.clone()));

    let chain = TaskChain::new()
        .then(searcher::search_task(
            query,
            today,
            web_searcher.clone(),
            search_tools,
        ))?
        .then(analyst::analysis_task(research_analyst.clone()))?
        .then(writer::writing_task(technical_writer.clone()))?;

    debug!(tasks = ?chain.ids(), "research crew assembled");

    Crew::new(
        vec![web_searcher, research_analyst, technical_writer],
        chain,
        config,
        events,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use deepcrew_core::{ChatMessage, Completion, LlmError, SearchRequest, ToolDefinition};
    use serde_json::Value;

    struct Silent;

    #[async_trait]
    impl LlmClient for Silent {
        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _tools: &[ToolDefinition],
        ) -> Result<Completion, LlmError> {
            Ok(Completion::default())
        }

        fn model_name(&self) -> &str {
            "silent"
        }
    }

    #[async_trait]
    impl SearchProvider for Silent {
        async fn search(&self, _request: &SearchRequest) -> anyhow::Result<Value> {
            Ok(Value::Null)
        }
    }

    fn backends() -> ResearchBackends {
        let silent = Arc::new(Silent);
        ResearchBackends::new(silent.clone(), silent)
    }

    #[test]
    fn crew_is_a_three_stage_chain() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let crew = build_research_crew(
            "solid-state batteries",
            today,
            &backends(),
            &CrewConfig::default(),
            EventCollector::default(),
        )
        .expect("crew");

        let chain = crew.chain();
        assert_eq!(chain.ids(), vec!["search", "analyze", "write"]);

        let search = chain.get(searcher::TASK_ID).unwrap();
        assert!(search.description.contains("about: solid-state batteries."));
        assert!(search.description.contains("2025-06-01"));
        assert!(search.context.is_empty());
        assert_eq!(search.effective_tools().names(), vec!["linkup_search"]);

        assert_eq!(chain.get(analyst::TASK_ID).unwrap().context, vec!["search"]);
        assert_eq!(chain.get(writer::TASK_ID).unwrap().context, vec!["analyze"]);
    }

    #[test]
    fn only_the_writer_refuses_delegation() {
        let crew = create_research_crew(
            "q",
            &backends(),
            &CrewConfig::default(),
            EventCollector::default(),
        )
        .unwrap();

        let roles: Vec<(&str, bool)> = crew
            .agents()
            .iter()
            .map(|agent| (agent.role(), agent.allows_delegation()))
            .collect();
        assert_eq!(
            roles,
            vec![
                (searcher::ROLE, true),
                (analyst::ROLE, true),
                (writer::ROLE, false)
            ]
        );
        assert!(crew.agents()[1].tools().is_empty());
    }
}
