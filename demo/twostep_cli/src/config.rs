use std::fs;
use std::path::Path;
use std::time::Duration;

use twostep_core::{Jitter, ProviderConfig, TwoStepConfig};

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_PATH: &str = "twostep.toml";

/// Everything the console front-end needs, minus the credential.
#[derive(Clone, Debug, Default)]
pub struct CliConfig {
    pub pipeline: TwoStepConfig,
    pub provider: ProviderOverrides,
}

/// Provider settings that may come from the file. The API key never does.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProviderOverrides {
    pub base_url: Option<String>,
    pub request_timeout_ms: Option<u64>,
}

impl ProviderOverrides {
    pub fn apply(&self, p: &mut ProviderConfig) {
        if let Some(v) = &self.base_url {
            p.base_url = v.clone();
        }
        if let Some(v) = self.request_timeout_ms {
            p.request_timeout = Duration::from_millis(v);
        }
    }
}

impl CliConfig {
    /// Load configuration from a TOML file, overlaying values onto env-driven
    /// defaults. A missing file is not an error; an unreadable or invalid one
    /// is logged and ignored.
    pub fn load(path: &Path) -> Self {
        let default = Self {
            pipeline: TwoStepConfig::from_env(),
            provider: ProviderOverrides::default(),
        };
        if !path.exists() {
            tracing::info!(target = "twostep", path = %path.display(), "No TOML config found; using defaults/env");
            return default;
        }
        match fs::read_to_string(path) {
            Ok(s) => match Self::parse(&s, default.clone()) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::warn!(target = "twostep", error = %e, "Failed to parse TOML; using defaults");
                    default
                }
            },
            Err(e) => {
                tracing::warn!(target = "twostep", error = %e, "Failed to read TOML; using defaults");
                default
            }
        }
    }

    pub fn parse(s: &str, base: Self) -> Result<Self, toml::de::Error> {
        toml::from_str::<TwoStepToml>(s).map(|t| t.overlay(base))
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TwoStepToml {
    pub pipeline: Option<PipelineToml>,
    pub retry: Option<RetryToml>,
    pub provider: Option<ProviderToml>,
}

impl TwoStepToml {
    fn overlay(self, mut base: CliConfig) -> CliConfig {
        if let Some(p) = self.pipeline {
            p.apply(&mut base.pipeline);
        }
        if let Some(r) = self.retry {
            r.apply(&mut base.pipeline);
        }
        if let Some(p) = self.provider {
            p.apply(&mut base.provider);
        }
        base
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct PipelineToml {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub system_prompt: Option<String>,
    pub reasoning_template: Option<String>,
    pub answer_template: Option<String>,
    pub pause_ms: Option<u64>,
    pub timeout_ms: Option<u64>, // 0 disables the overall deadline
}
impl PipelineToml {
    fn apply(self, c: &mut TwoStepConfig) {
        if let Some(x) = self.model {
            c.model = x;
        }
        if let Some(x) = self.temperature {
            c.temperature = x;
        }
        if let Some(x) = self.max_tokens {
            c.max_tokens = x;
        }
        if let Some(x) = self.system_prompt {
            c.system_prompt = x;
        }
        if let Some(x) = self.reasoning_template {
            c.reasoning_template = x;
        }
        if let Some(x) = self.answer_template {
            c.answer_template = x;
        }
        if let Some(x) = self.pause_ms {
            c.step_pause = Duration::from_millis(x);
        }
        if let Some(x) = self.timeout_ms {
            c.overall_timeout = (x > 0).then(|| Duration::from_millis(x));
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct RetryToml {
    pub max_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub jitter: Option<Jitter>,
}
impl RetryToml {
    fn apply(self, c: &mut TwoStepConfig) {
        if let Some(x) = self.max_attempts {
            c.retry.max_attempts = x;
        }
        if let Some(x) = self.base_delay_ms {
            c.retry.base_delay = Duration::from_millis(x);
        }
        if let Some(x) = self.max_delay_ms {
            c.retry.max_delay = Duration::from_millis(x);
        }
        if let Some(x) = self.jitter {
            c.retry.jitter = x;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct ProviderToml {
    pub base_url: Option<String>,
    pub request_timeout_ms: Option<u64>,
}
impl ProviderToml {
    fn apply(self, p: &mut ProviderOverrides) {
        if let Some(x) = self.base_url {
            p.base_url = Some(x);
        }
        if let Some(x) = self.request_timeout_ms {
            p.request_timeout_ms = Some(x);
        }
    }
}
