use std::collections::HashSet;
use std::env;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::DeepCrewError;

static REDACTION_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        (
            "api_key",
            Regex::new(r"(?i)(api[_-]?key\s*[:=]\s*)([A-Za-z0-9\-_.+/]+)")
                .expect("invalid api_key regex"),
        ),
        (
            "key_param",
            Regex::new(r"([?&]key=)([A-Za-z0-9\-_.]+)").expect("invalid key_param regex"),
        ),
        (
            "secret",
            Regex::new(r"(?i)(secret\s*[:=]\s*)([A-Za-z0-9\-_.+/]+)")
                .expect("invalid secret regex"),
        ),
        (
            "bearer",
            Regex::new(r"(?i)(bearer\s+)([A-Za-z0-9\-_.+=/]+)").expect("invalid bearer regex"),
        ),
        (
            "sk_token",
            Regex::new(r"(sk-[A-Za-z0-9]{16,})").expect("invalid sk_token regex"),
        ),
        (
            "google_key",
            Regex::new(r"(AIza[0-9A-Za-z\-_]{20,})").expect("invalid google_key regex"),
        ),
    ]
});

/// Wrapper around sensitive values to reduce accidental logging.
#[derive(Clone)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "***redacted***")
    }
}

/// Require that a given environment variable is set and non-empty.
pub fn require_env(var: &str) -> Result<SecretValue, DeepCrewError> {
    require_var(|name| env::var(name).ok(), var)
}

/// Same as [`require_env`] but resolves through an arbitrary lookup.
pub fn require_var<F>(lookup: F, var: &str) -> Result<SecretValue, DeepCrewError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(value) if !value.trim().is_empty() => Ok(SecretValue(value)),
        _ => Err(DeepCrewError::MissingSecret(var.to_string())),
    }
}

/// Strip credentials from free text before it reaches logs or end users.
///
/// Returns the sanitized text; the names of the patterns that fired are
/// pushed into `redactions`.
pub fn sanitize_text(input: &str, redactions: &mut HashSet<&'static str>) -> String {
    let mut output = input.to_string();
    for (name, regex) in REDACTION_PATTERNS.iter() {
        let mut matched = false;
        output = regex
            .replace_all(&output, |caps: &Captures| {
                matched = true;
                if caps.len() > 2 {
                    format!("{}[REDACTED]", &caps[1])
                } else {
                    "[REDACTED]".to_string()
                }
            })
            .to_string();
        if matched {
            redactions.insert(name);
        }
    }
    output
}

/// Convenience wrapper around [`sanitize_text`] when the pattern names are not needed.
pub fn redact(input: &str) -> String {
    let mut ignored = HashSet::new();
    sanitize_text(input, &mut ignored)
}
