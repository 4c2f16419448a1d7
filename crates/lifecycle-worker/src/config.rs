//! Worker process configuration.
//!
//! Sources, applied in order (later sources override earlier ones):
//!  1. `config/worker.yaml`: deployment-local defaults, optional
//!  2. `--config` / `LW_CONFIG_FILE`: operator-specified file, required when given
//!  3. Environment variables prefixed `LW__` with `__` separating sections,
//!     e.g. `LW__CONSUMER__WORKER_COUNT=10` sets `consumer.worker_count`
//!
//! Every field carries a serde default, so an entirely unconfigured
//! environment yields a valid configuration. A malformed file or a value that
//! cannot be coerced to its field type is a hard error.

use crate::error::ConfigError;
use lifecycle_queue::{ConsumerConfig, PublisherConfig};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

/// Default location of the deployment-local configuration file
pub const DEFAULT_CONFIG_FILE: &str = "config/worker.yaml";

/// Prefix of configuration environment variables
pub const ENV_PREFIX: &str = "LW";

/// Which queue backend the worker talks to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    #[default]
    Sqs,
    /// Process-local queues, for development without AWS
    InMemory,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl HealthConfig {
    pub fn address(&self) -> Result<SocketAddr, ConfigError> {
        let address = format!("{}:{}", self.host, self.port);
        address
            .parse()
            .map_err(|_| ConfigError::InvalidAddress { address })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// `EnvFilter` directives; `RUST_LOG` takes precedence when set
    pub filter: Option<String>,
}

/// Complete worker configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub backend: Backend,
    /// AWS region, overriding the environment's default
    pub region: Option<String>,
    /// Endpoint override, e.g. a local SQS emulator
    pub endpoint_url: Option<String>,
    pub consumer: ConsumerConfig,
    pub publisher: PublisherConfig,
    pub health: HealthConfig,
    pub logging: LoggingConfig,
}

impl WorkerConfig {
    /// Load from the default file, an optional explicit file and the environment
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE), explicit_path)
    }

    pub(crate) fn load_from(
        default_path: &Path,
        explicit_path: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder().add_source(
            config::File::from(default_path)
                .required(false)
                .format(config::FileFormat::Yaml),
        );

        if let Some(path) = explicit_path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config: Self = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.consumer
            .validate()
            .map_err(|source| ConfigError::Section {
                section: "consumer",
                source,
            })?;
        self.publisher
            .validate()
            .map_err(|source| ConfigError::Section {
                section: "publisher",
                source,
            })?;
        self.health.address()?;

        if matches!(&self.region, Some(region) if region.is_empty()) {
            return Err(ConfigError::EmptyField { field: "region" });
        }
        if matches!(&self.endpoint_url, Some(url) if url.is_empty()) {
            return Err(ConfigError::EmptyField {
                field: "endpoint_url",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
