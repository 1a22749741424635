//! The collaborator's verification rule and its HTTP surface.
//!
//! A share is authentic when its signature equals the SHA-256 digest of
//! `"{share}-{rte}"`, where `rte` is the runtime environment registered for
//! the share's owner. The registry never leaves this process, so providers
//! cannot forge signatures for environments they were not issued.

use axum::{extract::State, routing::post, Json, Router};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use async_trait::async_trait;

use crate::transport::DataShareEnvelope;

use super::{AttestationError, Attestor, VerifyRequest, VerifyResponse};

/// Per-owner runtime environment registry.
#[derive(Debug, Clone)]
pub struct RuntimeEnvironments(Vec<String>);

impl RuntimeEnvironments {
    pub fn new(environments: Vec<String>) -> Self {
        Self(environments)
    }

    /// Environment registered for an owner, if one was issued.
    pub fn for_owner(&self, user_id: u32) -> Option<&str> {
        self.0.get(user_id as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for RuntimeEnvironments {
    /// The ten-owner roster `env0` through `env9` used by the stock
    /// deployment.
    fn default() -> Self {
        Self((0..10).map(|i| format!("env{i}")).collect())
    }
}

/// Signature a provider in environment `rte` produces for `share`.
pub fn expected_signature(share: &str, rte: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{share}-{rte}").as_bytes());
    hex::encode(hasher.finalize())
}

/// Check one envelope against the registry.
pub fn verify_share(environments: &RuntimeEnvironments, envelope: &DataShareEnvelope) -> bool {
    match environments.for_owner(envelope.user_id) {
        Some(rte) => expected_signature(&envelope.share, rte) == envelope.signature,
        None => false,
    }
}

/// Check a whole batch. Any failing share fails the batch.
pub fn verify_batch(environments: &RuntimeEnvironments, shares: &[DataShareEnvelope]) -> bool {
    !shares.is_empty() && shares.iter().all(|s| verify_share(environments, s))
}

/// Build the collaborator's HTTP router.
pub fn router(environments: RuntimeEnvironments) -> Router {
    Router::new()
        .route("/verify", post(verify_handler))
        .with_state(Arc::new(environments))
}

async fn verify_handler(
    State(environments): State<Arc<RuntimeEnvironments>>,
    Json(request): Json<VerifyRequest>,
) -> Json<VerifyResponse> {
    let status = verify_batch(&environments, &request.data_shares);
    tracing::info!(
        shares = request.data_shares.len(),
        status,
        "Verification request handled"
    );
    Json(VerifyResponse { status })
}

/// In-process attestor running the rule directly, for deployments that
/// colocate the collaborator with the seller.
pub struct LocalAttestor {
    environments: RuntimeEnvironments,
}

impl LocalAttestor {
    pub fn new(environments: RuntimeEnvironments) -> Self {
        Self { environments }
    }
}

#[async_trait]
impl Attestor for LocalAttestor {
    async fn verify(&self, shares: &[DataShareEnvelope]) -> Result<bool, AttestationError> {
        Ok(verify_batch(&self.environments, shares))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope_for(share: &str, user_id: u32) -> DataShareEnvelope {
        let rte = format!("env{user_id}");
        DataShareEnvelope {
            share: share.to_string(),
            signature: expected_signature(share, &rte),
            user_id,
        }
    }

    #[test]
    fn signature_is_hex_sha256_of_share_and_rte() {
        // sha256("abc-env0") precomputed
        assert_eq!(
            expected_signature("abc", "env0"),
            "145d94ed1a3f5d29ba7fb690d7d730975a4732b8b2b49e619ff4a7a620200f5e"
        );
    }

    #[test]
    fn valid_batch_passes() {
        let environments = RuntimeEnvironments::default();
        let shares = vec![envelope_for("a", 0), envelope_for("b", 5), envelope_for("c", 9)];
        assert!(verify_batch(&environments, &shares));
    }

    #[test]
    fn one_bad_signature_fails_the_batch() {
        let environments = RuntimeEnvironments::default();
        let mut shares = vec![envelope_for("a", 0), envelope_for("b", 1)];
        shares[1].signature = expected_signature("b", "env2");
        assert!(!verify_batch(&environments, &shares));
    }

    #[test]
    fn unknown_owner_fails() {
        let environments = RuntimeEnvironments::default();
        let shares = vec![envelope_for("a", 99)];
        assert!(!verify_batch(&environments, &shares));
    }

    #[test]
    fn empty_batch_fails() {
        let environments = RuntimeEnvironments::default();
        assert!(!verify_batch(&environments, &[]));
    }

    #[test]
    fn signature_binds_to_the_share_text() {
        let environments = RuntimeEnvironments::default();
        let mut envelope = envelope_for("original", 3);
        envelope.share = "tampered".to_string();
        assert!(!verify_share(&environments, &envelope));
    }

    #[tokio::test]
    async fn local_attestor_applies_the_rule() {
        let attestor = LocalAttestor::new(RuntimeEnvironments::default());
        let shares = vec![envelope_for("a", 0)];
        assert!(attestor.verify(&shares).await.unwrap());

        let mut forged = shares.clone();
        forged[0].signature = "0000".to_string();
        assert!(!attestor.verify(&forged).await.unwrap());
    }
}
