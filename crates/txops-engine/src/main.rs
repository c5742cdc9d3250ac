//! txops - incremental transaction metrics and anomaly engine.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Incremental transaction metrics and anomaly engine
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via TXOPS_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    txops_telemetry::init_logging()?;

    info!("Starting txops v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > TXOPS_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("TXOPS_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = txops_engine::AppConfig::from_file(&config_path)?;
    info!(
        workers = config.ingest.workers,
        query_port = config.query.port,
        "Configuration loaded"
    );

    let app = txops_engine::Application::start(config).await?;
    app.run().await?;

    Ok(())
}
