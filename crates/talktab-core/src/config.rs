//! Application configuration model.
//!
//! Every section has defaults, so an empty TOML document is a valid config.
//! Section and key aliases accept the older `[parser_service]` / `[agent]`
//! layout.

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_VALIDATOR_URL: &str = "http://localhost:5001";
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL_NAME: &str = "gpt-4";
pub const DEFAULT_MAX_CYCLES: u32 = 10;

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct RootConfig {
    #[serde(alias = "parser_service")]
    pub validator: ValidatorConfig,
    #[serde(alias = "agent")]
    pub llm: LlmConfig,
    pub orchestrator: OrchestratorConfig,
    pub logging: LoggingConfig,
    pub environment: Environment,
}

/// Settings for the external schema validation service.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ValidatorConfig {
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Total delivery attempts per validation (values below 1 behave as 1).
    pub retry_attempts: u32,
    /// Delay before the second attempt; doubles for every attempt after that.
    pub base_delay_ms: u64,
}

impl ValidatorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn effective_attempts(&self) -> u32 {
        self.retry_attempts.max(1)
    }
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_VALIDATOR_URL.to_string(),
            timeout_secs: 30,
            retry_attempts: 3,
            base_delay_ms: 1000,
        }
    }
}

/// Settings for the OpenAI-compatible reasoning engine.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    #[serde(alias = "model")]
    pub model_name: String,
    pub temperature: f32,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub base_url: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL_NAME.to_string(),
            temperature: 0.1,
            max_tokens: 4000,
            api_key: None,
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Maximum reasoning/tool cycles in one exchange.
    pub max_cycles: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_cycles: DEFAULT_MAX_CYCLES,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, e.g. `info` or `talktab=debug`.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
    Test,
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            "test" => Ok(Environment::Test),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}
