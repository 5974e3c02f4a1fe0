//! infping Binary Entry Point
//!
//! Probes the configured hosts with fping and writes the results to InfluxDB.
//! Core functionality is provided by the `infping` library crate.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use infping::{
    config::AppConfig,
    probe::Pipeline,
    sink::{InfluxSink, LogSink, Sink},
    supervisor::Supervisor,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// infping - fping to InfluxDB bridge
#[derive(Parser, Debug)]
#[command(name = "infping", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml", env = "INFPING_CONFIG")]
    config: PathBuf,

    /// fping binary (overrides config file)
    #[arg(long, env = "INFPING_FPING_PATH")]
    fping_path: Option<PathBuf>,

    /// Log samples instead of writing them to InfluxDB
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,infping=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "infping starting");

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration from file
    tracing::info!(path = %cli.config.display(), "Loading configuration");
    let mut config = AppConfig::load(&cli.config)?;

    // Apply CLI/env overrides (CLI > ENV > config file)
    if let Some(path) = cli.fping_path {
        config = config.with_fping_path(path);
    }

    tracing::info!(
        fping = %config.fping.path.display(),
        report_interval = %humantime::format_duration(config.fping.report_interval),
        v4_hosts = config.hosts.v4.len(),
        v6_hosts = config.hosts.v6.len(),
        "Configuration loaded"
    );

    // Build sink
    let sink: Arc<dyn Sink> = if cli.dry_run {
        tracing::warn!("Dry run: samples are logged, not written");
        Arc::new(LogSink::new())
    } else {
        Arc::new(InfluxSink::connect(config.influx_sink_config()?).await?)
    };

    // Start one pipeline per address family with hosts
    let mut supervisor = Supervisor::new();
    for pipeline in config.pipeline_configs() {
        supervisor.spawn(Pipeline::new(pipeline, Arc::clone(&sink)))?;
    }

    tracing::info!(pipelines = supervisor.len(), "Press Ctrl+C to shutdown");

    let failure = tokio::select! {
        _ = shutdown_signal() => None,
        exit = supervisor.next_exit() => match exit {
            Some(exit) => Some(match exit.outcome {
                Ok(_) => format!("{} pipeline stopped unexpectedly", exit.family),
                Err(e) => format!("{} pipeline failed: {}", exit.family, e),
            }),
            None => Some("no pipeline running".to_string()),
        },
    };

    // A failed pipeline takes the others down with it
    for exit in supervisor.shutdown().await {
        if let Err(e) = exit.outcome {
            tracing::warn!(family = %exit.family, error = %e, "Pipeline ended with error during shutdown");
        }
    }

    match failure {
        Some(reason) => {
            tracing::error!(reason = %reason, "Shutdown after pipeline exit");
            Err(reason.into())
        }
        None => {
            tracing::info!("Shutdown complete");
            Ok(())
        }
    }
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }
}
