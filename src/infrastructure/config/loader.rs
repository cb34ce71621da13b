use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Project config file, created by the operator
pub const PROJECT_CONFIG: &str = ".dpi-console/config.yaml";

/// Optional local overrides, usually not checked in
pub const LOCAL_CONFIG: &str = ".dpi-console/local.yaml";

/// Prefix of environment overrides; `__` separates nested keys
pub const ENV_PREFIX: &str = "DPI_CONSOLE_";

/// Configuration error types
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid service base_url: {0:?}. Must be an http:// or https:// URL")]
    InvalidBaseUrl(String),

    #[error("Invalid timeout_secs: {0}. Must be at least 1")]
    InvalidTimeout(u64),

    #[error("Invalid polling interval_ms: {0}. Must be at least 100")]
    InvalidPollInterval(u64),

    #[error("Invalid resume_failure_threshold: {0}. Must be at least 1")]
    InvalidFailureThreshold(u32),

    #[error("Session store path cannot be empty")]
    EmptyStorePath,

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .dpi-console/config.yaml
    /// 3. .dpi-console/local.yaml
    /// 4. Environment variables (DPI_CONSOLE_* prefix)
    pub fn load() -> Result<Config> {
        Self::load_with(None)
    }

    /// Same as [`ConfigLoader::load`], except that `explicit` (from `--config`)
    /// replaces the two project files. Environment variables still win.
    pub fn load_with(explicit: Option<&Path>) -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        figment = match explicit {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                figment.merge(Yaml::file(path))
            }
            None => figment
                .merge(Yaml::file(PROJECT_CONFIG))
                .merge(Yaml::file(LOCAL_CONFIG)),
        };

        let config: Config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let base_url = config.service.base_url.trim();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://"))
            || base_url.ends_with("://")
        {
            return Err(ConfigError::InvalidBaseUrl(config.service.base_url.clone()));
        }

        if config.service.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout(config.service.timeout_secs));
        }

        if config.polling.interval_ms < 100 {
            return Err(ConfigError::InvalidPollInterval(config.polling.interval_ms));
        }

        if config.polling.resume_failure_threshold == 0 {
            return Err(ConfigError::InvalidFailureThreshold(
                config.polling.resume_failure_threshold,
            ));
        }

        if config.store.path.trim().is_empty() {
            return Err(ConfigError::EmptyStorePath);
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        Ok(())
    }
}
