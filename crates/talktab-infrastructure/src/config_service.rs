//! Configuration service implementation.
//!
//! Loads [`RootConfig`] from the first configuration file found:
//!
//! 1. an explicitly given path (must exist),
//! 2. `./config.toml`,
//! 3. `~/.config/talktab/config.toml`,
//!
//! falling back to defaults, then applies environment overrides.

use crate::paths::{CONFIG_FILE_NAME, PathError, TalktabPaths};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use talktab_core::config::{Environment, RootConfig};
use thiserror::Error;

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Errors that can occur while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },

    #[error(transparent)]
    Path(#[from] PathError),
}

/// Where the configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
}

/// Configuration service that resolves, parses and overrides the root config.
#[derive(Clone)]
pub struct ConfigService {
    explicit_path: Option<PathBuf>,
    search_user_dir: bool,
    env: EnvLookup,
}

impl ConfigService {
    /// Creates a service that reads the process environment.
    pub fn new(explicit_path: Option<PathBuf>) -> Self {
        Self {
            explicit_path,
            search_user_dir: true,
            env: Arc::new(|key| std::env::var(key).ok()),
        }
    }

    /// Replaces the environment lookup (used by tests).
    pub fn with_env(mut self, env: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        self.env = Arc::new(env);
        self
    }

    /// Skips `~/.config/talktab/config.toml` during resolution.
    pub fn without_user_config(mut self) -> Self {
        self.search_user_dir = false;
        self
    }

    /// Picks the configuration file to read, if any.
    pub fn resolve_path(&self) -> Result<Option<PathBuf>, ConfigError> {
        if let Some(path) = &self.explicit_path {
            return Ok(Some(path.clone()));
        }

        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.is_file() {
            return Ok(Some(local));
        }

        if self.search_user_dir {
            match TalktabPaths::config_file() {
                Ok(path) if path.is_file() => return Ok(Some(path)),
                Ok(_) | Err(PathError::HomeDirNotFound) => {}
            }
        }

        Ok(None)
    }

    /// Loads the configuration.
    ///
    /// # Errors
    ///
    /// A file that exists but cannot be read or parsed is an error, as is an
    /// explicit path that does not exist. A missing default file is not.
    pub fn load(&self) -> Result<(RootConfig, ConfigSource), ConfigError> {
        let (mut config, source) = match self.resolve_path()? {
            Some(path) => (Self::read_file(&path)?, ConfigSource::File(path)),
            None => (RootConfig::default(), ConfigSource::Defaults),
        };

        self.apply_env_overrides(&mut config)?;
        tracing::debug!(?source, "Configuration loaded");
        Ok((config, source))
    }

    fn read_file(path: &Path) -> Result<RootConfig, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_env_overrides(&self, config: &mut RootConfig) -> Result<(), ConfigError> {
        let var = |key: &str| (self.env)(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = var("PARSER_SERVICE_URL") {
            config.validator.base_url = url;
        }
        if let Some(key) = var("OPENAI_API_KEY") {
            config.llm.api_key = Some(key);
        }
        if let Some(model) = var("OPENAI_MODEL_NAME") {
            config.llm.model_name = model;
        }
        if let Some(level) = var("LOG_LEVEL") {
            config.logging.level = level.to_lowercase();
        }
        if let Some(env) = var("ENVIRONMENT") {
            config.environment =
                env.parse::<Environment>()
                    .map_err(|message| ConfigError::InvalidValue {
                        key: "ENVIRONMENT",
                        message,
                    })?;
        }
        Ok(())
    }
}

impl Default for ConfigService {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use talktab_core::config::LogFormat;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + Send + Sync + 'static {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_explicit_file_is_loaded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("talktab.toml");
        std::fs::write(
            &path,
            r#"
            [validator]
            base_url = "http://parser:9000"
            retry_attempts = 5

            [logging]
            format = "json"
            "#,
        )
        .unwrap();

        let (config, source) = ConfigService::new(Some(path.clone()))
            .with_env(env(&[]))
            .load()
            .unwrap();
        assert_eq!(source, ConfigSource::File(path));
        assert_eq!(config.validator.base_url, "http://parser:9000");
        assert_eq!(config.validator.retry_attempts, 5);
        assert_eq!(config.validator.timeout_secs, 30);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = ConfigService::new(Some(dir.path().join("absent.toml")))
            .with_env(env(&[]))
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[validator\nbase_url = ").unwrap();

        let err = ConfigService::new(Some(path))
            .with_env(env(&[]))
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_env_overrides_file_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[agent]\nmodel = \"gpt-4\"\n").unwrap();

        let (config, _) = ConfigService::new(Some(path))
            .with_env(env(&[
                ("PARSER_SERVICE_URL", "http://validator:5001"),
                ("OPENAI_API_KEY", "sk-env"),
                ("OPENAI_MODEL_NAME", "gpt-4o"),
                ("LOG_LEVEL", "DEBUG"),
                ("ENVIRONMENT", "production"),
            ]))
            .load()
            .unwrap();

        assert_eq!(config.validator.base_url, "http://validator:5001");
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.llm.model_name, "gpt-4o");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.environment, Environment::Production);
    }

    #[test]
    fn test_invalid_environment_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();

        let err = ConfigService::new(Some(path))
            .with_env(env(&[("ENVIRONMENT", "staging-ish")]))
            .load()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "ENVIRONMENT",
                ..
            }
        ));
    }
}
