//! Web search adapter.
//!
//! [`SearchTool`] wraps a [`SearchProvider`] behind the fail-soft [`Tool`]
//! contract: a provider error becomes a descriptive failure observation and
//! the agent may retry with different parameters.

use anyhow::{Context as _, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::config::SearchConfig;
use crate::error::DeepCrewError;
use crate::metrics;
use crate::security::{SecretValue, redact};
use crate::tools::{Tool, ToolOutcome};

pub const SEARCH_TOOL_NAME: &str = "linkup_search";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchDepth {
    #[default]
    Standard,
    Deep,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutputType {
    #[default]
    SearchResults,
    SourcedAnswer,
    Structured,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub depth: SearchDepth,
    #[serde(default)]
    pub output_type: OutputType,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            depth: SearchDepth::default(),
            output_type: OutputType::default(),
        }
    }

    pub fn with_depth(mut self, depth: SearchDepth) -> Self {
        self.depth = depth;
        self
    }

    pub fn with_output_type(mut self, output_type: OutputType) -> Self {
        self.output_type = output_type;
        self
    }
}

/// External search service: one request, one structured response.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> anyhow::Result<Value>;
}

/// Client for the Linkup `/search` endpoint.
pub struct LinkupClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: SecretValue,
}

impl LinkupClient {
    pub fn new(config: &SearchConfig, api_key: SecretValue) -> Result<Self, DeepCrewError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| {
                DeepCrewError::InvalidConfiguration(format!(
                    "failed to build search client: {err}"
                ))
            })?;

        Ok(Self {
            http,
            endpoint: format!("{}/search", config.base_url.trim_end_matches('/')),
            api_key,
        })
    }

    fn request_body(request: &SearchRequest) -> Value {
        let mut body = json!({
            "q": request.query,
            "depth": request.depth,
            "outputType": request.output_type,
        });
        if request.output_type == OutputType::Structured {
            body["structuredOutputSchema"] = Value::String(default_structured_schema());
        }
        body
    }
}

#[async_trait]
impl SearchProvider for LinkupClient {
    async fn search(&self, request: &SearchRequest) -> anyhow::Result<Value> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose())
            .json(&Self::request_body(request))
            .send()
            .await
            .context("search provider unreachable")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("search provider returned {status}: {body}"));
        }

        response
            .json::<Value>()
            .await
            .context("search provider returned malformed JSON")
    }
}

fn default_structured_schema() -> String {
    json!({
        "type": "object",
        "properties": {
            "findings": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "claim": {"type": "string"},
                        "source_title": {"type": "string"},
                        "source_url": {"type": "string"}
                    },
                    "required": ["claim", "source_url"]
                }
            }
        },
        "required": ["findings"]
    })
    .to_string()
}

/// Fail-soft search capability exposed to agents.
#[derive(Clone)]
pub struct SearchTool {
    provider: Arc<dyn SearchProvider>,
}

impl SearchTool {
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self { provider }
    }

    /// Run one search. Never fails: provider errors come back as [`ToolOutcome::Failure`].
    #[instrument(name = "tool.search", skip(self), fields(query = %request.query))]
    pub async fn search(&self, request: &SearchRequest) -> ToolOutcome {
        match self.provider.search(request).await {
            Ok(response) => {
                let text = serde_json::to_string_pretty(&response)
                    .unwrap_or_else(|_| response.to_string());
                debug!(bytes = text.len(), "search completed");
                ToolOutcome::success(text)
            }
            Err(err) => {
                metrics::record_search_failure();
                let reason = redact(&format!("{err:#}"));
                warn!(error = %reason, "search failed; returning error observation");
                ToolOutcome::failure(format!("Error occurred while searching: {reason}"))
            }
        }
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        SEARCH_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Search the web for information using LinkUp and return comprehensive results"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query to perform"
                },
                "depth": {
                    "type": "string",
                    "enum": ["standard", "deep"],
                    "description": "Depth of search: 'standard' or 'deep'",
                    "default": "standard"
                },
                "output_type": {
                    "type": "string",
                    "enum": ["searchResults", "sourcedAnswer", "structured"],
                    "description": "Output type: 'searchResults', 'sourcedAnswer', or 'structured'",
                    "default": "searchResults"
                }
            },
            "required": ["query"]
        })
    }

    async fn invoke(&self, args: Value) -> ToolOutcome {
        match serde_json::from_value::<SearchRequest>(args) {
            Ok(request) if request.query.trim().is_empty() => {
                ToolOutcome::failure("Error occurred while searching: query must not be empty")
            }
            Ok(request) => self.search(&request).await,
            Err(err) => {
                metrics::record_search_failure();
                ToolOutcome::failure(format!(
                    "Error occurred while searching: invalid arguments ({err})"
                ))
            }
        }
    }
}
