use std::time::Duration;

use crate::prompt::{ANSWER_TEMPLATE, CHAIN_OF_THOUGHT_VAR, PROMPT_VAR, REASONING_TEMPLATE};
use crate::retry::RetryPolicy;
use crate::{Result, TwoStepError};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a powerful assistant.";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Pipeline configuration. Immutable once the pipeline is built.
#[derive(Debug, Clone, PartialEq)]
pub struct TwoStepConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_prompt: String,
    /// Must contain `{prompt}`.
    pub reasoning_template: String,
    /// Must contain `{prompt}` and `{chain_of_thought}`.
    pub answer_template: String,
    /// Cosmetic pause between the two calls; zero skips it.
    pub step_pause: Duration,
    /// Upper bound on the whole two-call sequence, retries included.
    pub overall_timeout: Option<Duration>,
    pub retry: RetryPolicy,
}

impl Default for TwoStepConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.1,
            max_tokens: 500,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            reasoning_template: REASONING_TEMPLATE.to_string(),
            answer_template: ANSWER_TEMPLATE.to_string(),
            step_pause: Duration::from_secs(1),
            overall_timeout: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl TwoStepConfig {
    /// Defaults overlaid with `TWOSTEP_*` environment variables.
    /// Unparsable values are ignored.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(v) = env_string("TWOSTEP_MODEL") {
            cfg.model = v;
        }
        if let Some(v) = env_parse::<f32>("TWOSTEP_TEMPERATURE") {
            cfg.temperature = v;
        }
        if let Some(v) = env_parse::<u32>("TWOSTEP_MAX_TOKENS") {
            cfg.max_tokens = v;
        }
        if let Some(v) = env_string("TWOSTEP_SYSTEM_PROMPT") {
            cfg.system_prompt = v;
        }
        if let Some(v) = env_parse::<u64>("TWOSTEP_PAUSE_MS") {
            cfg.step_pause = Duration::from_millis(v);
        }
        if let Some(v) = env_parse::<u64>("TWOSTEP_TIMEOUT_MS") {
            cfg.overall_timeout = (v > 0).then(|| Duration::from_millis(v));
        }
        if let Some(v) = env_parse::<u32>("TWOSTEP_RETRY_ATTEMPTS") {
            cfg.retry.max_attempts = v;
        }
        cfg
    }

    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(TwoStepError::config("model must not be empty"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(TwoStepError::config(format!(
                "temperature must be within [0, 2], got {}",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(TwoStepError::config("max_tokens must be greater than zero"));
        }
        if !has_var(&self.reasoning_template, PROMPT_VAR) {
            return Err(TwoStepError::config(
                "reasoning template must contain {prompt}",
            ));
        }
        if !has_var(&self.answer_template, PROMPT_VAR)
            || !has_var(&self.answer_template, CHAIN_OF_THOUGHT_VAR)
        {
            return Err(TwoStepError::config(
                "answer template must contain {prompt} and {chain_of_thought}",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(TwoStepError::config("retry attempts must be at least 1"));
        }
        if self.retry.base_delay > self.retry.max_delay {
            return Err(TwoStepError::config(
                "retry base delay must not exceed the backoff ceiling",
            ));
        }
        Ok(())
    }
}

/// Where and how to reach the completion provider.
#[derive(Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: String,
    pub request_timeout: Duration,
}

impl ProviderConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(TwoStepError::config("API key must not be empty"));
        }
        Ok(Self {
            base_url: base_url.into(),
            api_key,
            request_timeout: Duration::from_secs(30),
        })
    }

    /// Read credentials once at startup. Fails before any network activity
    /// when `OPENAI_API_KEY` is missing or blank.
    pub fn from_env() -> Result<Self> {
        let api_key = env_string(API_KEY_ENV).ok_or_else(|| {
            TwoStepError::config(format!("{API_KEY_ENV} is not set"))
        })?;
        let base_url =
            env_string("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let mut cfg = Self::new(base_url, api_key)?;
        if let Some(ms) = env_parse::<u64>("REQUEST_TIMEOUT_MS") {
            cfg.request_timeout = Duration::from_millis(ms);
        }
        Ok(cfg)
    }
}

// Keep the key out of logs.
impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

fn has_var(template: &str, name: &str) -> bool {
    template.contains(&format!("{{{name}}}"))
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}
