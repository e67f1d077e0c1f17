use anyhow::{Context, Result, bail};
use std::env;
use std::time::Duration;

/// Settings of the HTTP layer itself; pipeline settings live in
/// [`deepcrew_core::Config`].
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub listen_addr: String,
    /// Upper bound on how long a request waits for its query.
    pub query_timeout: Option<Duration>,
}

impl AppConfig {
    const DEFAULT_LISTEN_ADDR: &'static str = "0.0.0.0:8000";

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_addr = lookup("DEEPCREW_API_ADDR")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| Self::DEFAULT_LISTEN_ADDR.to_string());

        let query_timeout = lookup("DEEPCREW_QUERY_TIMEOUT_SECS")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(|value| -> Result<Duration> {
                let secs = value
                    .parse::<u64>()
                    .with_context(|| "DEEPCREW_QUERY_TIMEOUT_SECS must be a whole number")?;
                if secs == 0 {
                    bail!("DEEPCREW_QUERY_TIMEOUT_SECS must be greater than zero");
                }
                Ok(Duration::from_secs(secs))
            })
            .transpose()?;

        Ok(Self {
            listen_addr,
            query_timeout,
        })
    }
}
