//! Binding commitments for the exchange protocol.
//!
//! # Responsibilities
//! - Compute the order-sensitive Merkle root over ciphertext blobs
//! - Derive the key commitment (hash-lock) for the session key
//! - Bundle both into the `Commitment` record published to the ledger
//!
//! # Design Decisions
//! - keccak-256 throughout, matching the escrow contract's hashing
//! - The root commits to ciphertexts, never plaintexts, so publishing it
//!   reveals nothing about the data
//! - Pure functions only; commitments are immutable once built

pub mod merkle;

pub use merkle::{merkle_root, CommitmentError};

use alloy::primitives::{keccak256, B256};
use serde::{Deserialize, Serialize};

/// Hash-lock for a symmetric key: publishing it binds the seller to the key
/// without revealing it.
pub fn key_commitment(key_bytes: &[u8]) -> B256 {
    keccak256(key_bytes)
}

/// Binding commitment published to the ledger before any payment moves.
///
/// Immutable after publication; the buyer verifies the delivered payload and
/// the revealed key against this record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    /// Merkle root over the ciphertext blobs, in delivery order.
    pub merkle_root: B256,
    /// keccak-256 of the symmetric key.
    pub key_commitment: B256,
}

impl Commitment {
    /// Build a commitment over already-encrypted blobs and the key they were
    /// encrypted with.
    pub fn over<B: AsRef<[u8]>>(ciphertexts: &[B], key_bytes: &[u8]) -> Result<Self, CommitmentError> {
        Ok(Self {
            merkle_root: merkle_root(ciphertexts)?,
            key_commitment: key_commitment(key_bytes),
        })
    }

    /// Check a revealed key against the hash-lock.
    pub fn matches_key(&self, key_bytes: &[u8]) -> bool {
        key_commitment(key_bytes) == self.key_commitment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commitment_binds_key() {
        let commitment = Commitment::over(&[b"blob".to_vec()], b"secret key bytes").unwrap();
        assert!(commitment.matches_key(b"secret key bytes"));
        assert!(!commitment.matches_key(b"some other key"));
    }

    #[test]
    fn key_commitment_is_plain_keccak() {
        assert_eq!(key_commitment(b"k"), keccak256(b"k"));
    }
}
