//! # Lifecycle Worker
//!
//! Worker process consuming lifecycle events from a queue.
//!
//! This crate:
//! - Loads configuration from files and the environment
//! - Builds the queue backend, the publisher and the consumer
//! - Registers the lifecycle event handlers
//! - Serves a health endpoint next to the consumer until shutdown
//!
//! ## Module Organization
//!
//! - [`config`] - Worker configuration and its sources
//! - [`error`] - Process errors and exit codes
//! - [`handlers`] - Lifecycle event types and handlers
//! - [`health`] - HTTP health endpoint

pub mod config;
pub mod error;
pub mod handlers;
pub mod health;

pub use crate::config::{Backend, LogFormat, WorkerConfig};
pub use crate::error::{ConfigError, WorkerError};

use clap::Parser;
use health::HealthState;
use lifecycle_queue::{
    CancellationToken, Consumer, InMemoryQueueClient, Publisher, QueueClient, SqsQueueClient,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

// ============================================================================
// CLI Structure
// ============================================================================

/// Lifecycle worker - consumes domain and hosting lifecycle events
#[derive(Debug, Parser)]
#[command(name = "lifecycle-worker")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Consumes domain and hosting lifecycle events from a queue")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "LW_CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Enable JSON logging, overriding the configured format
    #[arg(long)]
    pub json_logs: bool,

    /// Validate the configuration and exit
    #[arg(long)]
    pub check_config: bool,
}

// ============================================================================
// Process wiring
// ============================================================================

/// Build the queue backend selected by the configuration.
///
/// The in-memory backend starts with the consumer's and the publisher's
/// queues already created.
pub async fn build_client(config: &WorkerConfig) -> Arc<dyn QueueClient> {
    match config.backend {
        Backend::Sqs => Arc::new(
            SqsQueueClient::from_env(config.region.clone(), config.endpoint_url.clone()).await,
        ),
        Backend::InMemory => {
            let client = InMemoryQueueClient::new();
            client.create_queue_at(config.consumer.locator());
            client.create_queue_at(config.publisher.locator());
            Arc::new(client)
        }
    }
}

/// Run the consumer and the health server until `token` is cancelled.
///
/// A health server failure cancels `token` so the consumer stops with it.
pub async fn run(
    config: WorkerConfig,
    client: Arc<dyn QueueClient>,
    token: CancellationToken,
) -> Result<(), WorkerError> {
    let publisher = Publisher::new(Arc::clone(&client), config.publisher.clone())
        .await
        .map_err(|source| WorkerError::QueueSetup {
            component: "publisher",
            source,
        })?;

    let consumer = Consumer::new(
        client,
        handlers::registry(publisher.clone()),
        config.consumer.clone(),
    )
    .await
    .map_err(|source| WorkerError::QueueSetup {
        component: "consumer",
        source,
    })?;

    let address = config.health.address()?;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|source| WorkerError::BindFailed {
            address: address.to_string(),
            source,
        })?;
    info!(address = %address, "Health server listening");

    let app = health::router(HealthState {
        consumer: consumer.clone(),
        publisher,
    });

    let server = {
        let token = token.clone();
        async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(token.clone().cancelled_owned())
                .await;
            token.cancel();
            served.map_err(WorkerError::ServerFailed)
        }
    };

    let (served, ()) = tokio::join!(server, consumer.run(token));
    served?;

    info!("Worker shutdown complete");
    Ok(())
}

/// Resolve when the process receives SIGINT or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C), initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
