//! # Lifecycle Worker
//!
//! Binary entry point for the lifecycle worker.

use clap::Parser;
use lifecycle_queue::CancellationToken;
use lifecycle_worker::{build_client, run, shutdown_signal, Cli, LogFormat, WorkerConfig};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "lifecycle_worker=info,lifecycle_queue=info";

fn init_tracing(format: LogFormat, filter: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| filter.unwrap_or(DEFAULT_FILTER).into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match WorkerConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            let format = if cli.json_logs {
                LogFormat::Json
            } else {
                LogFormat::Pretty
            };
            init_tracing(format, None);
            error!(error = %e, "Worker configuration is invalid; aborting");
            std::process::exit(3);
        }
    };

    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        config.logging.format
    };
    init_tracing(format, config.logging.filter.as_deref());

    if let Some(path) = &cli.config {
        info!(path = %path.display(), "Loaded configuration from explicit path");
    }

    if cli.check_config {
        info!("Configuration is valid");
        return;
    }

    info!(
        backend = ?config.backend,
        consumer_queue = %config.consumer.queue_name.as_str(),
        publisher_queue = %config.publisher.queue_name.as_str(),
        "Starting lifecycle worker"
    );

    let client = build_client(&config).await;

    let token = CancellationToken::new();
    tokio::spawn({
        let token = token.clone();
        async move {
            shutdown_signal().await;
            token.cancel();
        }
    });

    if let Err(e) = run(config, client, token).await {
        error!(error = %e, "Worker failed");
        std::process::exit(e.exit_code());
    }
}
