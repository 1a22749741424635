//! Buyer CLI: run one exchange against a published seller offer.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use fairdex::config::{load_config, ExchangeConfig};
use fairdex::exchange::{BuyerCoordinator, BuyerSettings};
use fairdex::ledger::{EvmLedger, Wallet};
use fairdex::observability::logging;

#[derive(Parser)]
#[command(name = "buyer-cli")]
#[command(about = "Buy one attested data bundle from the exchange", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// IP address to advertise for payload delivery.
    #[arg(long, default_value = "127.0.0.1")]
    bind_ip: String,

    /// Delivery port. Zero binds an ephemeral port.
    #[arg(long, default_value_t = 0)]
    port: u16,

    /// Which seller in the initialization roster to buy from.
    #[arg(long, default_value_t = 0)]
    seller_index: usize,

    /// Print the decrypted shares to stdout.
    #[arg(long)]
    show_shares: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ExchangeConfig::default(),
    };

    logging::init(&config.observability.log_level);
    tracing::info!(
        seller_index = cli.seller_index,
        contract = %config.ledger.contract_address,
        "Buyer starting"
    );

    let wallet = Wallet::from_env(config.ledger.chain_id)?;
    tracing::info!(identity = %wallet.address(), "Wallet loaded");

    let ledger = Arc::new(EvmLedger::connect(config.ledger.clone(), wallet).await?);
    let settings = BuyerSettings::from_config(&config, cli.bind_ip, cli.port, cli.seller_index);
    let buyer = BuyerCoordinator::new(ledger, settings);

    let purchase = buyer.run_exchange().await?;
    println!(
        "session {} complete: {} shares bought from {} for {}",
        purchase.session_id,
        purchase.shares.len(),
        purchase.seller,
        purchase.price
    );
    if cli.show_shares {
        for (i, share) in purchase.shares.iter().enumerate() {
            println!("share[{i}]: {}", String::from_utf8_lossy(share));
        }
    }

    Ok(())
}
