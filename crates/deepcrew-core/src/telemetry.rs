use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, fmt};

use crate::DeepCrewError;

static TELEMETRY_GUARD: OnceLock<()> = OnceLock::new();

/// Configuration options when initialising telemetry.
#[derive(Debug, Clone)]
pub struct TelemetryOptions {
    pub env_filter: Option<String>,
    pub with_ansi: bool,
    pub with_target: bool,
    /// Write log lines to stderr, keeping stdout for program output.
    pub to_stderr: bool,
}

impl Default for TelemetryOptions {
    fn default() -> Self {
        Self {
            env_filter: None,
            with_ansi: true,
            with_target: false,
            to_stderr: false,
        }
    }
}

impl TelemetryOptions {
    /// Options for a binary whose configured log level acts as the fallback filter.
    pub fn with_default_level(level: &str) -> Self {
        Self {
            env_filter: std::env::var("RUST_LOG")
                .ok()
                .or_else(|| Some(format!("{level},deepcrew_core={level}"))),
            ..Self::default()
        }
    }
}

/// Initialise the global tracing subscriber.
///
/// Safe to call multiple times; only the first invocation installs the subscriber.
pub fn init_telemetry(options: TelemetryOptions) -> Result<(), DeepCrewError> {
    if TELEMETRY_GUARD.get().is_some() {
        return Ok(());
    }

    let env_filter = options
        .env_filter
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| "info".to_string());

    let builder = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_ansi(options.with_ansi)
        .with_target(options.with_target);
    let installed = if options.to_stderr {
        builder.with_writer(std::io::stderr).try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|err| {
        DeepCrewError::InvalidConfiguration(format!("telemetry init failed: {err}"))
    })?;

    TELEMETRY_GUARD.get_or_init(|| ());
    Ok(())
}
