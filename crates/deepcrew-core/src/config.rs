use std::{
    env, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::Deserialize;

use crate::{DeepCrewError, SecretValue, require_env, require_var};

const DEFAULT_CONFIG_PATH: &str = "deepcrew.toml";
const CONFIG_PATH_ENV: &str = "DEEPCREW_CONFIG";

/// Top-level configuration structure.
///
/// Every section has defaults, so an absent file yields a usable
/// configuration once the two API keys are present in the environment.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub crew: CrewConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Resolve the configured LLM secret value (from environment only).
    pub fn llm_api_key(&self) -> Result<SecretValue, DeepCrewError> {
        require_env(&self.llm.api_key_env)
    }

    /// Resolve the search provider secret value (from environment only).
    pub fn search_api_key(&self) -> Result<SecretValue, DeepCrewError> {
        require_env(&self.search.api_key_env)
    }
}

/// Helper to load configuration from an optional TOML file plus environment overrides.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a provided path or discoverable defaults.
    ///
    /// Resolution order:
    /// 1. Explicit `path` argument (must exist).
    /// 2. `DEEPCREW_CONFIG` environment variable (must exist).
    /// 3. `deepcrew.toml` in the current working directory, if present.
    ///
    /// `DEEPCREW_*` environment variables override file values afterwards.
    pub fn load(path: Option<PathBuf>) -> Result<Config, DeepCrewError> {
        Self::load_with(path, |name| env::var(name).ok())
    }

    /// Same as [`ConfigLoader::load`] with an injectable variable lookup.
    pub fn load_with<F>(path: Option<PathBuf>, lookup: F) -> Result<Config, DeepCrewError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match resolve_path(path, &lookup) {
            Some(candidate) => Self::read_file(&candidate)?,
            None => Config::default(),
        };

        apply_overrides(&mut config, &lookup)?;
        Self::validate(&config, &lookup)?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Config, DeepCrewError> {
        let raw = fs::read_to_string(path)
            .map_err(|err| DeepCrewError::config_io(path.to_path_buf(), err))?;
        toml::from_str(&raw).map_err(|err| DeepCrewError::InvalidConfiguration(err.to_string()))
    }

    fn validate<F>(config: &Config, lookup: &F) -> Result<(), DeepCrewError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if config.llm.api_key_env.trim().is_empty() {
            return Err(DeepCrewError::InvalidConfiguration(
                "llm.api_key_env must reference an environment variable".into(),
            ));
        }
        if config.search.api_key_env.trim().is_empty() {
            return Err(DeepCrewError::InvalidConfiguration(
                "search.api_key_env must reference an environment variable".into(),
            ));
        }
        if config.llm.model.trim().is_empty() {
            return Err(DeepCrewError::InvalidConfiguration(
                "llm.model must not be empty".into(),
            ));
        }
        if config.crew.max_tool_iterations == 0 {
            return Err(DeepCrewError::InvalidConfiguration(
                "crew.max_tool_iterations must be at least 1".into(),
            ));
        }

        // Secrets are only ever read from the environment; fail at load time
        // rather than on the first query.
        require_var(lookup, &config.llm.api_key_env)?;
        require_var(lookup, &config.search.api_key_env)?;
        Ok(())
    }
}

fn resolve_path<F>(path: Option<PathBuf>, lookup: &F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = path {
        return Some(path);
    }

    if let Some(from_env) = lookup(CONFIG_PATH_ENV) {
        if !from_env.trim().is_empty() {
            return Some(PathBuf::from(from_env));
        }
    }

    let default = Path::new(DEFAULT_CONFIG_PATH);
    default.exists().then(|| default.to_path_buf())
}

fn apply_overrides<F>(config: &mut Config, lookup: &F) -> Result<(), DeepCrewError>
where
    F: Fn(&str) -> Option<String>,
{
    let text = |name: &str| {
        lookup(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    if let Some(model) = text("DEEPCREW_LLM_MODEL") {
        config.llm.model = model;
    }
    if let Some(url) = text("DEEPCREW_LLM_BASE_URL") {
        config.llm.base_url = url;
    }
    if let Some(name) = text("DEEPCREW_LLM_API_KEY_ENV") {
        config.llm.api_key_env = name;
    }
    if let Some(value) = text("DEEPCREW_LLM_TIMEOUT_SECS") {
        config.llm.timeout_secs = parse_value("DEEPCREW_LLM_TIMEOUT_SECS", &value)?;
    }
    if let Some(url) = text("DEEPCREW_SEARCH_BASE_URL") {
        config.search.base_url = url;
    }
    if let Some(value) = text("DEEPCREW_SEARCH_TIMEOUT_SECS") {
        config.search.timeout_secs = parse_value("DEEPCREW_SEARCH_TIMEOUT_SECS", &value)?;
    }
    if let Some(value) = text("DEEPCREW_MAX_TOOL_ITERATIONS") {
        config.crew.max_tool_iterations = parse_value("DEEPCREW_MAX_TOOL_ITERATIONS", &value)?;
    }
    if let Some(level) = text("DEEPCREW_LOG_LEVEL") {
        config.logging.level = level;
    }
    Ok(())
}

fn parse_value<T: FromStr>(name: &str, raw: &str) -> Result<T, DeepCrewError> {
    raw.parse::<T>().map_err(|_| {
        DeepCrewError::InvalidConfiguration(format!("{name} has an invalid value: {raw}"))
    })
}

/// Sampling temperature is not part of this section; requests always use
/// [`crate::llm::SAMPLING_TEMPERATURE`], and a `temperature` key is rejected.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible chat-completions API.
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            model: "gemini-2.5-flash".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub base_url: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.linkup.so/v1".to_string(),
            api_key_env: "LINKUP_API_KEY".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrewConfig {
    /// Upper bound on LLM turns per task before a final answer is forced.
    pub max_tool_iterations: usize,
}

impl CrewConfig {
    const fn default_max_tool_iterations() -> usize {
        10
    }
}

impl Default for CrewConfig {
    fn default() -> Self {
        Self {
            max_tool_iterations: Self::default_max_tool_iterations(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env_with(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        let mut vars: HashMap<String, String> = HashMap::from([
            ("GEMINI_API_KEY".to_string(), "gemini-secret".to_string()),
            ("LINKUP_API_KEY".to_string(), "linkup-secret".to_string()),
        ]);
        for (key, value) in pairs {
            vars.insert(key.to_string(), value.to_string());
        }
        vars
    }

    #[test]
    fn defaults_apply_without_file() {
        let vars = env_with(&[]);
        let config = ConfigLoader::load_with(None, |k| vars.get(k).cloned()).expect("config");
        assert_eq!(config.llm.model, "gemini-2.5-flash");
        assert_eq!(config.search.api_key_env, "LINKUP_API_KEY");
        assert_eq!(config.crew.max_tool_iterations, 10);
    }

    #[test]
    fn file_values_are_overridden_by_environment() {
        let mut file = NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "[llm]\nmodel = \"from-file\"\n\n[crew]\nmax_tool_iterations = 4"
        )
        .unwrap();

        let vars = env_with(&[("DEEPCREW_LLM_MODEL", "from-env")]);
        let config = ConfigLoader::load_with(Some(file.path().to_path_buf()), |k| {
            vars.get(k).cloned()
        })
        .expect("config");

        assert_eq!(config.llm.model, "from-env");
        assert_eq!(config.crew.max_tool_iterations, 4);
        assert_eq!(config.search.base_url, "https://api.linkup.so/v1");
    }

    #[test]
    fn missing_secret_is_rejected() {
        let vars = HashMap::from([("GEMINI_API_KEY".to_string(), "x".to_string())]);
        let err = ConfigLoader::load_with(None, |k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, DeepCrewError::MissingSecret(name) if name == "LINKUP_API_KEY"));
    }

    #[test]
    fn temperature_cannot_be_configured() {
        let mut file = NamedTempFile::new().expect("temp file");
        writeln!(file, "[llm]\ntemperature = 0.3").unwrap();

        let vars = env_with(&[]);
        let err = ConfigLoader::load_with(Some(file.path().to_path_buf()), |k| {
            vars.get(k).cloned()
        })
        .unwrap_err();
        assert!(matches!(err, DeepCrewError::InvalidConfiguration(msg) if msg.contains("temperature")));
    }

    #[test]
    fn malformed_override_is_rejected() {
        let vars = env_with(&[("DEEPCREW_LLM_TIMEOUT_SECS", "soon")]);
        let err = ConfigLoader::load_with(None, |k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, DeepCrewError::InvalidConfiguration(_)));

        let vars = env_with(&[("DEEPCREW_MAX_TOOL_ITERATIONS", "0")]);
        let err = ConfigLoader::load_with(None, |k| vars.get(k).cloned()).unwrap_err();
        assert!(matches!(err, DeepCrewError::InvalidConfiguration(_)));
    }

    #[test]
    fn explicit_missing_file_reports_io_error() {
        let vars = env_with(&[]);
        let err = ConfigLoader::load_with(Some(PathBuf::from("/nonexistent/deepcrew.toml")), |k| {
            vars.get(k).cloned()
        })
        .unwrap_err();
        assert!(matches!(err, DeepCrewError::ConfigIo { .. }));
    }
}
