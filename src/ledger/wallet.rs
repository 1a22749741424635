//! Signing identity and sequencing state.
//!
//! # Security
//! - Private keys are loaded ONLY from environment variables
//! - Keys are never logged or serialized

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;

use super::types::LedgerError;

/// Environment variable name for the private key.
pub const PRIVATE_KEY_ENV_VAR: &str = "FAIRDEX_LEDGER_PRIVATE_KEY";

/// Signing identity for ledger submissions.
///
/// Clones share the nonce counter, so every handle hands out distinct
/// sequence numbers.
#[derive(Debug, Clone)]
pub struct Wallet {
    signer: PrivateKeySigner,
    nonce: Arc<AtomicU64>,
    /// Chain ID for replay protection.
    chain_id: u64,
}

impl Wallet {
    /// Parse a hex-encoded private key, with or without a 0x prefix.
    ///
    /// The key stays in memory only; it is never logged.
    pub fn from_private_key(private_key_hex: &str, chain_id: u64) -> Result<Self, LedgerError> {
        let trimmed = private_key_hex.strip_prefix("0x").unwrap_or(private_key_hex);
        let signer = trimmed
            .parse::<PrivateKeySigner>()
            .map_err(|e| LedgerError::Permanent(format!("invalid private key format: {e}")))?;

        Ok(Self {
            signer,
            nonce: Arc::new(AtomicU64::new(0)),
            chain_id,
        })
    }

    /// Load the wallet from `FAIRDEX_LEDGER_PRIVATE_KEY`.
    pub fn from_env(chain_id: u64) -> Result<Self, LedgerError> {
        let private_key = std::env::var(PRIVATE_KEY_ENV_VAR).map_err(|_| {
            LedgerError::Permanent(format!("environment variable {PRIVATE_KEY_ENV_VAR} not set"))
        })?;

        Self::from_private_key(&private_key, chain_id)
    }

    /// The wallet's address.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// The underlying signer, for building a sending provider.
    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }

    /// Chain ID this wallet signs for.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Take the next nonce, advancing the shared counter.
    pub fn next_nonce(&self) -> u64 {
        self.nonce.fetch_add(1, Ordering::SeqCst)
    }

    /// Re-seed the counter, e.g. from the chain's transaction count.
    pub fn sync_nonce(&self, nonce: u64) {
        self.nonce.store(nonce, Ordering::SeqCst);
    }
}
