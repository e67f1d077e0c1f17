//! Query Service: the only place where pipeline errors are turned into text.

use async_trait::async_trait;
use deepcrew_core::{
    Config, CrewConfig, DeepCrewError, Event, EventCollector, ReportCheck, TaskOutput,
    check_report, drain_events, metrics, redact,
};
use serde::Serialize;
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

use crate::crew::{ResearchBackends, create_research_crew};

/// Prefix of every failure string returned by [`QueryService::run`].
pub const ERROR_PREFIX: &str = "Error: ";

/// Everything a caller may want from one successful run.
#[derive(Debug, Clone, Serialize)]
pub struct ResearchOutcome {
    pub run_id: String,
    /// Raw markdown from the final stage.
    pub report: String,
    pub check: ReportCheck,
    pub stages: Vec<TaskOutput>,
    pub events: Vec<Event>,
}

/// Query-in, text-out boundary used by the HTTP façade.
#[async_trait]
pub trait QueryHandler: Send + Sync {
    async fn handle(&self, query: &str) -> String;
}

#[derive(Debug, Clone)]
pub struct QueryService {
    backends: ResearchBackends,
    crew: CrewConfig,
}

impl QueryService {
    pub fn new(backends: ResearchBackends, crew: CrewConfig) -> Self {
        Self { backends, crew }
    }

    pub fn from_config(config: &Config) -> Result<Self, DeepCrewError> {
        Ok(Self::new(
            ResearchBackends::from_config(config)?,
            config.crew.clone(),
        ))
    }

    /// Run the pipeline for `query` and return the report, or a string
    /// starting with `"Error: "` if any stage failed.
    pub async fn run(&self, query: &str) -> String {
        match self.run_detailed(query).await {
            Ok(outcome) => outcome.report,
            Err(err) => format!("{ERROR_PREFIX}{}", redact(&err.to_string())),
        }
    }

    /// Same pipeline as [`QueryService::run`], keeping the structural check,
    /// per-stage outputs and the lifecycle trace.
    pub async fn run_detailed(&self, query: &str) -> Result<ResearchOutcome, DeepCrewError> {
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("query.run", run_id = %run_id, query_chars = query.len());

        async move {
            info!("research run started");
            let (events, mut receiver) = EventCollector::new();

            let result = match create_research_crew(query, &self.backends, &self.crew, events) {
                Ok(crew) => crew.kickoff().await,
                Err(err) => Err(err),
            };

            match result {
                Ok(output) => {
                    metrics::record_run("success");
                    let check = check_report(&output.raw);
                    check.log_warnings();
                    info!(
                        chars = output.raw.len(),
                        issues = check.issues.len(),
                        "research run finished"
                    );
                    Ok(ResearchOutcome {
                        run_id,
                        report: output.raw,
                        check,
                        stages: output.tasks,
                        events: drain_events(&mut receiver),
                    })
                }
                Err(err) => {
                    metrics::record_run("failure");
                    error!(error = %redact(&err.to_string()), "research run failed");
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }
}

#[async_trait]
impl QueryHandler for QueryService {
    async fn handle(&self, query: &str) -> String {
        self.run(query).await
    }
}
