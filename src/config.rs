//! Environment-driven configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::core::budget::DEFAULT_TOLERANCE_PERCENT;
use crate::core::planner::DEFAULT_MAX_RETRIES;
use crate::core::usage::DEFAULT_COST_PER_1K_TOKENS;
use crate::error::{PlannerError, Result};
use crate::services::model::GenerationParams;
use crate::services::openai_client::{DEFAULT_BASE_URL, DEFAULT_MODEL};

pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_BASE_URL: &str = "OPENAI_BASE_URL";
pub const ENV_OPENROUTER_BASE_URL: &str = "OPENROUTER_BASE_URL";
pub const ENV_MODEL: &str = "PLANNER_MODEL";
pub const ENV_PROMPT_TEMPLATE: &str = "PLANNER_PROMPT_TEMPLATE";
pub const ENV_MAX_RETRIES: &str = "PLANNER_MAX_RETRIES";
pub const ENV_TIMEOUT_SECS: &str = "PLANNER_TIMEOUT_SECS";
pub const ENV_BUDGET_TOLERANCE: &str = "PLANNER_BUDGET_TOLERANCE";
pub const ENV_COST_PER_1K_TOKENS: &str = "PLANNER_COST_PER_1K_TOKENS";
pub const ENV_DEBUG_DIR: &str = "PLANNER_DEBUG_DIR";

const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, PartialEq)]
pub struct PlannerConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    /// Template file; the built-in prompt is used when unset
    pub prompt_template: Option<PathBuf>,
    pub max_retries: usize,
    pub timeout: Duration,
    pub budget_tolerance_percent: f64,
    pub cost_per_1k_tokens: f64,
    /// Directory receiving parse-failure payloads
    pub debug_dir: Option<PathBuf>,
    pub params: GenerationParams,
}

impl PlannerConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            prompt_template: None,
            max_retries: DEFAULT_MAX_RETRIES,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            budget_tolerance_percent: DEFAULT_TOLERANCE_PERCENT,
            cost_per_1k_tokens: DEFAULT_COST_PER_1K_TOKENS,
            debug_dir: None,
            params: GenerationParams::default(),
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let api_key = get(ENV_API_KEY).ok_or_else(|| {
            PlannerError::Config(format!(
                "{ENV_API_KEY} environment variable must be set before starting the planner"
            ))
        })?;

        let mut config = Self::new(api_key);
        if let Some(base_url) = get(ENV_BASE_URL).or_else(|| get(ENV_OPENROUTER_BASE_URL)) {
            config.base_url = base_url;
        }
        if let Some(model) = get(ENV_MODEL) {
            config.model = model;
        }
        config.prompt_template = get(ENV_PROMPT_TEMPLATE).map(PathBuf::from);
        config.debug_dir = get(ENV_DEBUG_DIR).map(PathBuf::from);

        if let Some(retries) = parse_var::<usize>(ENV_MAX_RETRIES, get(ENV_MAX_RETRIES))? {
            config.max_retries = retries;
        }
        if let Some(secs) = parse_var::<u64>(ENV_TIMEOUT_SECS, get(ENV_TIMEOUT_SECS))? {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(tolerance) =
            parse_var::<f64>(ENV_BUDGET_TOLERANCE, get(ENV_BUDGET_TOLERANCE))?
        {
            config.budget_tolerance_percent = non_negative(ENV_BUDGET_TOLERANCE, tolerance)?;
        }
        if let Some(rate) =
            parse_var::<f64>(ENV_COST_PER_1K_TOKENS, get(ENV_COST_PER_1K_TOKENS))?
        {
            config.cost_per_1k_tokens = non_negative(ENV_COST_PER_1K_TOKENS, rate)?;
        }

        Ok(config)
    }
}

fn parse_var<T>(name: &str, raw: Option<String>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.map(|value| {
        value.parse::<T>().map_err(|err| {
            PlannerError::Config(format!("{name} has invalid value {value:?}: {err}"))
        })
    })
    .transpose()
}

fn non_negative(name: &str, value: f64) -> Result<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(PlannerError::Config(format!(
            "{name} must be a non-negative number, got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let err = PlannerConfig::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_defaults() {
        let config = PlannerConfig::from_lookup(lookup(&[(ENV_API_KEY, "sk-test")])).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.timeout, Duration::from_secs(120));
        assert_eq!(config.budget_tolerance_percent, 5.0);
        assert_eq!(config.params.max_output_tokens, 8192);
        assert!(config.prompt_template.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = PlannerConfig::from_lookup(lookup(&[
            (ENV_API_KEY, "sk-test"),
            (ENV_OPENROUTER_BASE_URL, "http://localhost:9000/v1"),
            (ENV_MODEL, "openai/gpt-4.1-mini"),
            (ENV_MAX_RETRIES, "4"),
            (ENV_TIMEOUT_SECS, "30"),
            (ENV_BUDGET_TOLERANCE, "2.5"),
            (ENV_DEBUG_DIR, "/tmp/planner-debug"),
        ]))
        .unwrap();
        assert_eq!(config.base_url, "http://localhost:9000/v1");
        assert_eq!(config.model, "openai/gpt-4.1-mini");
        assert_eq!(config.max_retries, 4);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.budget_tolerance_percent, 2.5);
        assert_eq!(config.debug_dir, Some(PathBuf::from("/tmp/planner-debug")));
    }

    #[test]
    fn test_bad_numbers_are_rejected() {
        let err = PlannerConfig::from_lookup(lookup(&[
            (ENV_API_KEY, "sk-test"),
            (ENV_MAX_RETRIES, "two"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains(ENV_MAX_RETRIES));

        let err = PlannerConfig::from_lookup(lookup(&[
            (ENV_API_KEY, "sk-test"),
            (ENV_BUDGET_TOLERANCE, "-1"),
        ]))
        .unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }
}
