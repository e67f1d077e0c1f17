use std::path::PathBuf;

use thiserror::Error;

/// Core error type for DeepCrew.
#[derive(Debug, Error)]
pub enum DeepCrewError {
    #[error("configuration error: {0}")]
    InvalidConfiguration(String),
    #[error("missing environment variable: {0}")]
    MissingSecret(String),
    #[error("I/O error while reading {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid task chain: {0}")]
    InvalidChain(String),
    #[error("task '{stage}' failed: {reason}")]
    StageFailed { stage: String, reason: String },
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DeepCrewError {
    pub fn config_io(path: PathBuf, source: std::io::Error) -> Self {
        Self::ConfigIo { path, source }
    }

    pub fn stage_failed(stage: impl Into<String>, reason: impl ToString) -> Self {
        Self::StageFailed {
            stage: stage.into(),
            reason: reason.to_string(),
        }
    }
}

/// Failure talking to the language-model backend.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    Transport(String),
    #[error("LLM backend returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode LLM response: {0}")]
    Decode(String),
    #[error("LLM response contained no choices")]
    EmptyResponse,
}
