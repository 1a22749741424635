//! Ledger event and error definitions.

use alloy::primitives::{Address, U256};
use thiserror::Error;

/// Bits of the event sequence reserved for the within-block log index.
const LOG_INDEX_BITS: u64 = 20;

/// Pack a block number and log index into one totally ordered sequence.
///
/// Block number dominates, log index breaks ties within a block. Twenty bits
/// of log index is far beyond what any block can hold.
pub fn pack_sequence(block_number: u64, log_index: u64) -> u64 {
    (block_number << LOG_INDEX_BITS) | (log_index & ((1 << LOG_INDEX_BITS) - 1))
}

/// Block number a sequence value falls in.
pub fn block_of(sequence: u64) -> u64 {
    sequence >> LOG_INDEX_BITS
}

/// Errors from ledger operations.
///
/// The split is the retry contract: transient failures may be retried with
/// the same payload, permanent ones abort the session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Sequencing conflicts, timeouts and connectivity faults.
    #[error("transient ledger failure: {0}")]
    Transient(String),

    /// Rejected or reverted calls. Retrying cannot succeed.
    #[error("permanent ledger failure: {0}")]
    Permanent(String),
}

impl LedgerError {
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Transient(_))
    }
}

/// Substrings that mark an RPC failure as retryable.
const TRANSIENT_MARKERS: &[&str] = &[
    "nonce",
    "underpriced",
    "already known",
    "timeout",
    "timed out",
    "connection",
    "transport",
    "network",
    "unreachable",
    "refused",
    "reset",
    "error sending request",
    "temporarily",
];

/// Map a raw RPC failure onto the transient/permanent split.
///
/// Reverts and malformed calls fall through to permanent; everything that
/// smells like sequencing or connectivity trouble is worth retrying.
pub(crate) fn classify_rpc_error(op: &'static str, message: &str) -> LedgerError {
    let lower = message.to_ascii_lowercase();
    if TRANSIENT_MARKERS.iter().any(|marker| lower.contains(marker)) {
        LedgerError::Transient(format!("{op}: {message}"))
    } else {
        LedgerError::Permanent(format!("{op}: {message}"))
    }
}

/// A protocol event recorded on the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    /// A seller published a commitment. Carries the full roster of
    /// initialized sellers plus the newcomer's asking price.
    SellerInitialized { sellers: Vec<Address>, price: U256 },
    /// A buyer escrowed payment for a seller.
    PaymentMade {
        seller: Address,
        buyer_ip: String,
        buyer_port: u16,
    },
    /// A seller published its session key.
    KeyRevealed { seller: Address, key: Vec<u8> },
}

impl LedgerEvent {
    /// Whether this event concerns the given seller.
    ///
    /// An initialization event announces the roster's newest member; listing
    /// earlier sellers again does not make it theirs.
    pub fn concerns(&self, seller: Address) -> bool {
        match self {
            LedgerEvent::SellerInitialized { sellers, .. } => sellers.last() == Some(&seller),
            LedgerEvent::PaymentMade { seller: s, .. } => *s == seller,
            LedgerEvent::KeyRevealed { seller: s, .. } => *s == seller,
        }
    }

    /// Stable name for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerEvent::SellerInitialized { .. } => "seller_initialized",
            LedgerEvent::PaymentMade { .. } => "payment_made",
            LedgerEvent::KeyRevealed { .. } => "key_revealed",
        }
    }
}

/// An event plus its position in the ledger's total order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencedEvent {
    pub sequence: u64,
    pub event: LedgerEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_orders_by_block_then_log_index() {
        assert!(pack_sequence(5, 0) > pack_sequence(4, 1023));
        assert!(pack_sequence(5, 1) > pack_sequence(5, 0));
        assert_eq!(block_of(pack_sequence(7, 12)), 7);
    }

    #[test]
    fn nonce_conflicts_are_transient() {
        let err = classify_rpc_error("initialize", "nonce too low: next nonce 4, tx nonce 3");
        assert!(err.is_transient());
    }

    #[test]
    fn connectivity_faults_are_transient() {
        assert!(classify_rpc_error("accept", "error sending request for url").is_transient());
        assert!(classify_rpc_error("accept", "Connection refused (os error 111)").is_transient());
    }

    #[test]
    fn reverts_are_permanent() {
        let err = classify_rpc_error("initialize", "execution reverted: already initialized");
        assert!(!err.is_transient());
    }

    #[test]
    fn event_seller_filter() {
        let a = Address::repeat_byte(0xaa);
        let b = Address::repeat_byte(0xbb);

        let init = LedgerEvent::SellerInitialized { sellers: vec![a], price: U256::from(10) };
        assert!(init.concerns(a));
        assert!(!init.concerns(b));

        // A later initialization repeats the roster; it is the newcomer's.
        let later = LedgerEvent::SellerInitialized { sellers: vec![a, b], price: U256::from(20) };
        assert!(later.concerns(b));
        assert!(!later.concerns(a));

        let paid = LedgerEvent::PaymentMade {
            seller: b,
            buyer_ip: "127.0.0.1".into(),
            buyer_port: 9000,
        };
        assert!(paid.concerns(b));
        assert!(!paid.concerns(a));
    }
}
