//! Attestation collaborator daemon: serves the share verification endpoint.

use std::path::PathBuf;

use clap::Parser;

use fairdex::attestation::{service, RuntimeEnvironments};
use fairdex::config::{load_config, ExchangeConfig};
use fairdex::lifecycle::wait_for_signal;
use fairdex::observability::logging;

#[derive(Parser)]
#[command(name = "attestor")]
#[command(about = "Share attestation collaborator", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address for the verification endpoint.
    #[arg(long, default_value = "127.0.0.1:8000")]
    bind: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ExchangeConfig::default(),
    };

    logging::init(&config.observability.log_level);

    let environments = RuntimeEnvironments::new(config.attestation.runtime_environments.clone());
    let app = service::router(environments);

    let listener = tokio::net::TcpListener::bind(&cli.bind).await?;
    tracing::info!(address = %listener.local_addr()?, "Attestor listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_signal())
        .await?;

    tracing::info!("Attestor stopped");
    Ok(())
}
