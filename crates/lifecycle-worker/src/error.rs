//! Worker process errors and their exit codes.

use lifecycle_queue::{ConfigurationError, QueueError};
use thiserror::Error;

/// Errors loading or validating the worker configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid {section} configuration: {source}")]
    Section {
        section: &'static str,
        #[source]
        source: ConfigurationError,
    },

    #[error("Invalid health address: {address}")]
    InvalidAddress { address: String },

    #[error("{field} must not be empty when set")]
    EmptyField { field: &'static str },
}

/// Errors that stop the worker process
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error("Failed to set up {component}: {source}")]
    QueueSetup {
        component: &'static str,
        #[source]
        source: QueueError,
    },

    #[error("Failed to bind health server to {address}: {source}")]
    BindFailed {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Health server failed: {0}")]
    ServerFailed(#[source] std::io::Error),
}

impl WorkerError {
    /// Process exit code reported for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::BindFailed { .. } => 1,
            Self::ServerFailed(_) => 2,
            Self::Configuration(_) => 3,
            Self::QueueSetup { .. } => 4,
        }
    }
}
