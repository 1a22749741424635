//! Wire messages exchanged over the transport.
//!
//! Field names are the wire contract; both sides of the protocol parse these
//! exact shapes. Ciphertext blobs travel base64-encoded so the whole payload
//! stays valid JSON.

use alloy::primitives::Address;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::TransportError;

/// One attested data fragment as submitted by the data provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataShareEnvelope {
    /// The fragment itself, opaque to everything but the attestor rule.
    pub share: String,
    /// Provider-computed authenticity signature over the share.
    pub signature: String,
    /// Owner the signature is checked against.
    pub user_id: u32,
}

/// A complete submission: the share batch plus the asking price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareSubmission {
    pub data_shares: Vec<DataShareEnvelope>,
    pub price: u64,
}

/// Acknowledgement returned to the submitter once the session commitment is
/// published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionAck {
    pub accepted: bool,
    pub session_id: Uuid,
}

/// Ciphertext payload pushed to the buyer's claimed endpoint.
///
/// Blob order is commitment order; the receiver recomputes the Merkle root
/// over the decoded blobs exactly as listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub session_id: Uuid,
    pub seller: Address,
    pub blobs: Vec<String>,
}

impl Delivery {
    pub fn from_ciphertexts(session_id: Uuid, seller: Address, ciphertexts: &[Vec<u8>]) -> Self {
        Self {
            session_id,
            seller,
            blobs: ciphertexts.iter().map(|c| BASE64.encode(c)).collect(),
        }
    }

    /// Decode the blobs back to raw ciphertexts, preserving order.
    pub fn decode_blobs(&self) -> Result<Vec<Vec<u8>>, TransportError> {
        self.blobs
            .iter()
            .map(|b| {
                BASE64
                    .decode(b)
                    .map_err(|e| TransportError::Malformed(format!("invalid blob encoding: {e}")))
            })
            .collect()
    }
}
