use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "claude-3-sonnet-20240229";
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 4000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

pub const ENV_API_KEY: &str = "ANTHROPIC_API_KEY";
pub const ENV_BASE_URL: &str = "ANTHROPIC_BASE_URL";
pub const ENV_MODEL: &str = "FORECAST_MODEL";
pub const ENV_MAX_TOKENS: &str = "FORECAST_MAX_TOKENS";
pub const ENV_TIMEOUT_SECS: &str = "FORECAST_TIMEOUT_SECS";

/// Settings for the model client. Built once at start-up and handed to the
/// client explicitly.
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(skip_serializing)]
    pub api_key: String,
    pub model: String,
    pub max_output_tokens: u32,
    /// Per-request timeout
    pub timeout: Duration,
    /// Pause before the single retry of a transient failure
    pub retry_delay: Duration,
    pub retry_transient: bool,
    pub base_url: String,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            retry_transient: true,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = tokens;
        self
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key/value source. Only the API key is
    /// required.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(ENV_API_KEY)
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ForecastError::Config(format!("{} must be set", ENV_API_KEY)))?;

        let mut config = Self::new(api_key.trim());
        if let Some(model) = lookup(ENV_MODEL).filter(|m| !m.trim().is_empty()) {
            config.model = model.trim().to_string();
        }
        if let Some(base_url) = lookup(ENV_BASE_URL).filter(|u| !u.trim().is_empty()) {
            config.base_url = base_url.trim().trim_end_matches('/').to_string();
        }
        if let Some(tokens) = parse_var::<u32>(&lookup, ENV_MAX_TOKENS)? {
            config.max_output_tokens = tokens;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, ENV_TIMEOUT_SECS)? {
            config.timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_output_tokens == 0 {
            return Err(ForecastError::Config(
                "max_output_tokens must be positive".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(ForecastError::Config("timeout must be positive".to_string()));
        }
        if self.model.trim().is_empty() {
            return Err(ForecastError::Config("model must not be empty".to_string()));
        }
        Ok(())
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ForecastError::Config(format!("{}='{}': {}", key, raw, e))),
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("timeout", &self.timeout)
            .field("retry_delay", &self.retry_delay)
            .field("retry_transient", &self.retry_transient)
            .field("base_url", &self.base_url)
            .finish()
    }
}
