//! Session state machines and the exchange error taxonomy.

use alloy::primitives::{Address, U256};
use thiserror::Error;

use crate::attestation::AttestationError;
use crate::cipher::CipherError;
use crate::ledger::LedgerError;
use crate::transport::TransportError;

/// Seller-side session states.
///
/// `Completed`, `Rejected` and `Aborted` are terminal. `Rejected` is only
/// reachable before anything touched the ledger; `Aborted` only after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SellerState {
    /// Waiting for a complete share submission on the inbound connection.
    AwaitingShares,
    /// Submission parsed; consulting the attestor.
    Attesting,
    /// Commitment published on the ledger.
    Committed,
    /// Payload delivered; watching for the payment event.
    AwaitingPayment,
    /// Key reveal confirmed on the ledger.
    KeyRevealed,
    Completed,
    /// Attestation said no or could not be consulted. No ledger side effects.
    Rejected,
    /// Failure after the session touched the ledger.
    Aborted,
}

impl SellerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SellerState::Completed | SellerState::Rejected | SellerState::Aborted)
    }

    /// Stable name for logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            SellerState::AwaitingShares => "awaiting_shares",
            SellerState::Attesting => "attesting",
            SellerState::Committed => "committed",
            SellerState::AwaitingPayment => "awaiting_payment",
            SellerState::KeyRevealed => "key_revealed",
            SellerState::Completed => "completed",
            SellerState::Rejected => "rejected",
            SellerState::Aborted => "aborted",
        }
    }

    /// Legal forward transitions. Everything else is a protocol bug.
    pub fn can_advance_to(self, next: SellerState) -> bool {
        use SellerState::*;
        matches!(
            (self, next),
            (AwaitingShares, Attesting)
                | (Attesting, Committed)
                | (Attesting, Rejected)
                | (Attesting, Aborted)
                | (Committed, AwaitingPayment)
                | (Committed, Aborted)
                | (AwaitingPayment, KeyRevealed)
                | (AwaitingPayment, Aborted)
                | (KeyRevealed, Completed)
                | (KeyRevealed, Aborted)
        )
    }
}

/// Buyer-side session states.
///
/// `Decrypted` and `VerificationFailed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuyerState {
    /// Publishing the delivery endpoint claim.
    Claiming,
    /// Claim recorded; listening for the payload.
    AwaitingDelivery,
    /// Payload received; recomputing the commitment.
    Verifying,
    /// Payment escrowed on the ledger.
    Paid,
    /// Watching for the key reveal event.
    AwaitingKey,
    Decrypted,
    /// Payload did not match the published commitment. No payment was made.
    VerificationFailed,
}

impl BuyerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BuyerState::Decrypted | BuyerState::VerificationFailed)
    }

    /// Stable name for logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            BuyerState::Claiming => "claiming",
            BuyerState::AwaitingDelivery => "awaiting_delivery",
            BuyerState::Verifying => "verifying",
            BuyerState::Paid => "paid",
            BuyerState::AwaitingKey => "awaiting_key",
            BuyerState::Decrypted => "decrypted",
            BuyerState::VerificationFailed => "verification_failed",
        }
    }

    /// Legal forward transitions.
    pub fn can_advance_to(self, next: BuyerState) -> bool {
        use BuyerState::*;
        matches!(
            (self, next),
            (Claiming, AwaitingDelivery)
                | (AwaitingDelivery, Verifying)
                | (Verifying, Paid)
                | (Verifying, VerificationFailed)
                | (Paid, AwaitingKey)
                | (AwaitingKey, Decrypted)
        )
    }
}

/// A seller's published offer, as the buyer sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SellerOffer {
    pub seller: Address,
    pub price: U256,
}

/// Error type for exchange sessions.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// Submission or delivery that fails parsing or schema validation.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// The attestor judged the share batch inauthentic.
    #[error("attestation rejected the share batch")]
    AttestationRejected,

    /// No attestation verdict could be obtained.
    #[error(transparent)]
    Attestor(#[from] AttestationError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Delivered payload does not hash to the published commitment.
    #[error("payload does not match the published commitment")]
    VerificationFailed,

    /// Revealed key fails the hash-lock check.
    #[error("revealed key does not match the published commitment")]
    KeyMismatch,

    #[error(transparent)]
    Cipher(#[from] CipherError),

    /// A protocol phase outlived its configured deadline.
    #[error("deadline expired while {0}")]
    DeadlineExpired(&'static str),

    /// A state transition outside the legal table was attempted.
    #[error("illegal session transition: {from} -> {to}")]
    IllegalTransition { from: &'static str, to: &'static str },

    #[error(transparent)]
    Transport(#[from] TransportError),
}
