//! Fair Data Exchange Library

pub mod attestation;
pub mod cipher;
pub mod commitment;
pub mod config;
pub mod exchange;
pub mod ledger;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod transport;

pub use config::schema::ExchangeConfig;
pub use exchange::{BuyerCoordinator, SellerCoordinator};
pub use ledger::LedgerClient;
pub use lifecycle::Shutdown;
