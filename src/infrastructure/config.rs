//! Hierarchical configuration: programmatic defaults -> `neoscan.yaml` ->
//! `NEOSCAN_`-prefixed environment variables.

use std::time::Duration;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "neoscan.db".to_string(), max_connections: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub log_dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string(), log_dir: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub min_interval_ms: u64,
    pub limiter_initial: u32,
    pub limiter_min: u32,
    pub limiter_max: u32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self { min_interval_ms: 200, limiter_initial: 10, limiter_min: 1, limiter_max: 100 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MasterConfig {
    pub bind_addr: String,
    pub auth_token: String,
    pub ip_whitelist: Vec<String>,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self { bind_addr: "0.0.0.0:9000".to_string(), auth_token: String::new(), ip_whitelist: Vec::new() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub master_url: String,
    pub max_concurrent_tasks: usize,
    pub heartbeat_interval_secs: u64,
    pub task_poll_interval_secs: u64,
    pub auth_token: String,
    pub listen_port: u16,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            master_url: "http://127.0.0.1:9000".to_string(),
            max_concurrent_tasks: 10,
            heartbeat_interval_secs: 30,
            task_poll_interval_secs: 5,
            auth_token: String::new(),
            listen_port: 9100,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub dispatch: DispatchConfig,
    pub master: MasterConfig,
    pub agent: AgentConfig,
}

impl AgentConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn task_poll_interval(&self) -> Duration {
        Duration::from_secs(self.task_poll_interval_secs)
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads config with figment's usual precedence: defaults, then
    /// `neoscan.yaml` in the current directory, then `NEOSCAN_`-prefixed
    /// env vars (double underscore splits nested keys).
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file("neoscan.yaml"))
            .merge(Env::prefixed("NEOSCAN_").split("__"))
            .extract()
            .context("failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.is_empty() {
            return Err(ConfigError::MissingField("database.path".to_string()));
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                field: "database.max_connections".to_string(),
                value: "0".to_string(),
            });
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "logging.level".to_string(),
                value: config.logging.level.clone(),
            });
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "logging.format".to_string(),
                value: config.logging.format.clone(),
            });
        }

        if config.dispatch.limiter_min > config.dispatch.limiter_initial
            || config.dispatch.limiter_initial > config.dispatch.limiter_max
        {
            return Err(ConfigError::InvalidValue {
                field: "dispatch.limiter_{min,initial,max}".to_string(),
                value: format!(
                    "{}/{}/{}",
                    config.dispatch.limiter_min, config.dispatch.limiter_initial, config.dispatch.limiter_max
                ),
            });
        }

        Ok(())
    }
}
