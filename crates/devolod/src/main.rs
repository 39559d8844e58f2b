use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use devolod::Config;
use devolod::Engine;
use devolod::LogLevel;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// devolo Home Control daemon
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(default_value = "devolod.toml")]
    config: PathBuf,

    /// Override the configured log level
    #[arg(long, value_enum)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(config.logging.filter())
        .init();

    tracing::info!("devolod starting");
    tracing::info!("Loaded config from: {}", args.config.display());

    let engine = Arc::new(Engine::new());
    let registered = engine.register_integrations_from_config(&config);
    if registered == 0 {
        tracing::warn!("No integrations configured");
    }

    let engine_task = tokio::spawn({
        let engine = engine.clone();
        async move { engine.run().await }
    });

    let api = config.api.clone().map(|api| {
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let engine = engine.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = devolod::api::serve(&api.listen, api.port, engine, shutdown_rx).await {
                tracing::error!("HTTP API server failed: {:#}", e);
            }
        });
        (shutdown_tx, task)
    });

    tracing::info!("Press Ctrl+C to exit");
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received shutdown signal"),
        Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
    }

    if let Some((shutdown_tx, task)) = api {
        let _ = shutdown_tx.send(());
        if let Err(e) = task.await {
            tracing::error!("HTTP API task failed: {}", e);
        }
    }

    tracing::info!("Shutting down integrations...");
    engine.shutdown().await;
    engine_task.abort();

    tracing::info!("devolod shutdown complete");
    Ok(())
}
