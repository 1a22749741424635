//! Fair Data Exchange Seller Daemon
//!
//! Sells attested data shares for on-ledger payment without either side
//! having to trust the other.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌────────────────────────────────────────────────────┐
//!                        │                  SELLER DAEMON                      │
//!                        │                                                     │
//!     Share Submission   │  ┌──────────┐   ┌─────────────┐   ┌─────────────┐  │
//!     ───────────────────┼─▶│transport │──▶│ attestation │──▶│   cipher    │  │
//!                        │  │ listener │   │    gate     │   │ + commitment│  │
//!                        │  └──────────┘   └─────────────┘   └──────┬──────┘  │
//!                        │                                          │         │
//!                        │                                          ▼         │
//!                        │                                  ┌─────────────┐   │
//!                        │                                  │   ledger    │   │
//!                        │                                  │ init/reveal │   │
//!                        │                                  └──────┬──────┘   │
//!                        │                                          │         │
//!     Ciphertext Payload │  ┌──────────┐   ┌─────────────┐          │         │
//!     ◀──────────────────┼──│transport │◀──│  exchange   │◀─────────┘         │
//!                        │  │ delivery │   │ coordinator │   payment events   │
//!                        │  └──────────┘   └─────────────┘                    │
//!                        │                                                     │
//!                        │  ┌───────────────────────────────────────────────┐  │
//!                        │  │            Cross-Cutting Concerns             │  │
//!                        │  │  ┌────────┐ ┌───────────┐ ┌───────────────┐  │  │
//!                        │  │  │ config │ │observa-   │ │  resilience   │  │  │
//!                        │  │  │        │ │ bility    │ │ backoff/retry │  │  │
//!                        │  │  └────────┘ └───────────┘ └───────────────┘  │  │
//!                        │  │  ┌─────────────────────────────────────────┐  │  │
//!                        │  │  │     lifecycle: signals and shutdown     │  │  │
//!                        │  │  └─────────────────────────────────────────┘  │  │
//!                        │  └───────────────────────────────────────────────┘  │
//!                        └────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use fairdex::attestation::HttpAttestor;
use fairdex::config::{load_config, ExchangeConfig};
use fairdex::exchange::{SellerCoordinator, SellerSettings};
use fairdex::ledger::{EvmLedger, Wallet};
use fairdex::lifecycle::{self, Shutdown};
use fairdex::observability::{logging, metrics};
use fairdex::transport::{ConnectionTracker, Listener};

/// How long shutdown waits for in-flight sessions before giving up.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "fairdex")]
#[command(about = "Fair data exchange seller daemon", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ExchangeConfig::default(),
    };

    logging::init(&config.observability.log_level);
    tracing::info!("fairdex seller daemon starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        contract = %config.ledger.contract_address,
        chain_id = config.ledger.chain_id,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let wallet = Wallet::from_env(config.ledger.chain_id)?;
    tracing::info!(identity = %wallet.address(), "Wallet loaded");

    let ledger = Arc::new(EvmLedger::connect(config.ledger.clone(), wallet).await?);
    let attestor = Arc::new(HttpAttestor::new(&config.attestation)?);
    let coordinator = Arc::new(SellerCoordinator::new(
        ledger,
        attestor,
        SellerSettings::from_config(&config),
    ));

    let listener = Listener::bind(&config.listener).await?;
    let tracker = ConnectionTracker::new();

    let shutdown = Arc::new(Shutdown::new());
    lifecycle::trigger_on_signal(Arc::clone(&shutdown));
    let mut shutdown_rx = shutdown.subscribe();

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                tracing::info!("Shutdown signal received, draining sessions");
                break;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer, permit)) => {
                        let coordinator = Arc::clone(&coordinator);
                        let guard = tracker.track();
                        tokio::spawn(async move {
                            let _permit = permit;
                            let _guard = guard;
                            if let Err(e) = coordinator.handle_connection(stream, peer).await {
                                tracing::warn!(peer = %peer, error = %e, "Exchange failed");
                            }
                        });
                    }
                    Err(e) => tracing::error!(error = %e, "Accept failed"),
                }
            }
        }
    }

    if tokio::time::timeout(DRAIN_TIMEOUT, tracker.drained()).await.is_err() {
        tracing::warn!(
            remaining = tracker.active_count(),
            "Drain timeout expired with sessions still in flight"
        );
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
