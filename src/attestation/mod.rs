//! Share authenticity attestation.
//!
//! # Responsibilities
//! - Define the attestor seam the seller gates sessions on
//! - Talk to a remote attestation collaborator over HTTP
//! - Host the collaborator's verification rule for deployments that run it
//!
//! # Design Decisions
//! - Whole-batch verdict: one inauthentic share rejects the submission
//! - "Could not consult the collaborator" is distinct from "the collaborator
//!   said no", so operators can tell an outage from a forgery
//! - Signatures are deterministic digests over the share and its owner's
//!   runtime environment, which only the collaborator knows

pub mod client;
pub mod service;

pub use client::HttpAttestor;
pub use service::{LocalAttestor, RuntimeEnvironments};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::transport::DataShareEnvelope;

/// Error type for attestation operations.
#[derive(Debug, Error)]
pub enum AttestationError {
    /// The collaborator could not be reached or timed out.
    #[error("attestor unreachable: {0}")]
    Unreachable(String),
    /// The collaborator answered with something other than a verdict.
    #[error("attestor returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// Verdict source for share batches.
///
/// `Ok(false)` means the batch was judged inauthentic; `Err` means no verdict
/// could be obtained at all.
#[async_trait]
pub trait Attestor: Send + Sync {
    async fn verify(&self, shares: &[DataShareEnvelope]) -> Result<bool, AttestationError>;
}

/// Request body for the verification endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub data_shares: Vec<DataShareEnvelope>,
}

/// Response body from the verification endpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VerifyResponse {
    /// True when every share in the batch carried a valid signature.
    pub status: bool,
}
