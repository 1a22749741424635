//! Escrow ledger access.
//!
//! # Responsibilities
//! - Define the ledger seam both exchange roles drive
//! - Publish commitments, claims, payments and key reveals as transactions
//! - Expose the ordered, at-least-once event feed sessions react to
//! - Classify every failure as transient or permanent
//!
//! # Design Decisions
//! - One trait, two implementations: an EVM contract binding for production
//!   and an in-memory ledger with the same observable semantics for tests
//! - Events carry a total-order sequence so "claim happened before reveal"
//!   is a comparison, not a guess
//! - Callers never see raw RPC errors, only the transient/permanent split
//!   that decides between retry and abort

pub mod evm;
pub mod memory;
pub mod types;
pub mod wallet;
pub mod watcher;

pub use evm::EvmLedger;
pub use memory::InMemoryLedger;
pub use types::{LedgerError, LedgerEvent, SequencedEvent};
pub use wallet::Wallet;
pub use watcher::EventWatcher;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;

use crate::commitment::Commitment;

/// Client handle to the escrow ledger, bound to one party's identity.
///
/// Mutating calls return only after the ledger has durably applied them, so
/// a successful `reveal_key` means the key is public.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// The party this handle signs as.
    fn identity(&self) -> Address;

    /// Publish the session commitment and asking price. Emits
    /// `SellerInitialized`.
    async fn initialize(&self, commitment: Commitment, price: U256) -> Result<(), LedgerError>;

    /// Record the caller's delivery endpoint. Emits no event; the seller
    /// discovers the claim by polling [`LedgerClient::claimed_buyer`].
    async fn claim(&self, ip: &str, port: u16) -> Result<(), LedgerError>;

    /// Escrow `value` for the given seller. Emits `PaymentMade`.
    async fn accept(&self, seller: Address, value: U256) -> Result<(), LedgerError>;

    /// Publish the symmetric key. Emits `KeyRevealed`.
    async fn reveal_key(&self, key: &[u8]) -> Result<(), LedgerError>;

    /// Events with `sequence >= cursor`, ascending. Only events old enough
    /// to be considered settled are returned.
    async fn events_since(&self, cursor: u64) -> Result<Vec<SequencedEvent>, LedgerError>;

    /// The published commitment for a seller, if any.
    async fn commitment_of(&self, seller: Address) -> Result<Option<Commitment>, LedgerError>;

    /// The delivery endpoint a buyer has claimed, if any.
    async fn claimed_buyer(&self) -> Result<Option<(String, u16)>, LedgerError>;
}
