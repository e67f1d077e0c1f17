//! Client for a running `deepcrew-api` instance.

use anyhow::{Context, Result, bail};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Value, json};
use tracing::{debug, warn};

pub const DEFAULT_API_URL: &str = "http://localhost:8000/query";

const NO_RESULT: &str = "No result returned from API.";
const GENERIC_FAILURE: &str =
    "An error occurred while contacting backend API. Please try again later.";

static JSON_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("invalid json block regex"));
static QUOTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""([^"]+)""#).expect("invalid quoted string regex"));

pub struct ResearchClient {
    http: reqwest::Client,
    url: String,
}

impl ResearchClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
        }
    }

    /// Submit one query. Always yields text: the report, the pipeline's own
    /// `"Error: ..."` string, or a short message describing a transport failure.
    pub async fn ask(&self, input: &str) -> String {
        match self.try_ask(input).await {
            Ok(result) => result,
            Err(err) => {
                let raw = format!("{err:#}");
                warn!(error = %raw, "research API call failed");
                friendly_error(&raw)
            }
        }
    }

    async fn try_ask(&self, input: &str) -> Result<String> {
        debug!(url = %self.url, chars = input.len(), "posting query");
        let response = self
            .http
            .post(&self.url)
            .json(&json!({ "input": input }))
            .send()
            .await
            .with_context(|| format!("failed to reach {}", self.url))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("failed to read response body")?;
        if !status.is_success() {
            bail!("{status} for {}: {body}", self.url);
        }

        let payload: Value = serde_json::from_str(&body).context("response is not JSON")?;
        Ok(match payload.get("result") {
            Some(Value::String(text)) => text.clone(),
            Some(Value::Null) | None => NO_RESULT.to_string(),
            Some(other) => other.to_string(),
        })
    }
}

/// Reduce a raw failure description to something worth showing a user.
///
/// Tries, in order: an embedded JSON object carrying `error.message` or
/// `detail`, the last double-quoted fragment, then a generic message.
pub fn friendly_error(raw: &str) -> String {
    let from_json = JSON_BLOCK
        .find(raw)
        .and_then(|block| serde_json::from_str::<Value>(block.as_str()).ok())
        .and_then(|value| {
            value
                .pointer("/error/message")
                .or_else(|| value.get("detail"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .filter(|message| !message.trim().is_empty());

    from_json
        .or_else(|| {
            QUOTED
                .captures_iter(raw)
                .last()
                .and_then(|caps| caps.get(1))
                .map(|quoted| quoted.as_str().to_string())
        })
        .unwrap_or_else(|| GENERIC_FAILURE.to_string())
}
