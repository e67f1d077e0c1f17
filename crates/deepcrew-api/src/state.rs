use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use deepcrew_agents::{QueryHandler, QueryService};
use deepcrew_core::Config;

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    handler: Arc<dyn QueryHandler>,
    query_timeout: Option<Duration>,
}

impl AppState {
    pub fn new(handler: Arc<dyn QueryHandler>, query_timeout: Option<Duration>) -> Self {
        Self {
            handler,
            query_timeout,
        }
    }

    /// Build the real query service from the loaded pipeline configuration.
    pub fn try_new(app: &AppConfig, pipeline: &Config) -> Result<Self> {
        let service = QueryService::from_config(pipeline)?;
        Ok(Self::new(Arc::new(service), app.query_timeout))
    }

    pub fn handler(&self) -> Arc<dyn QueryHandler> {
        self.handler.clone()
    }

    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout
    }
}
