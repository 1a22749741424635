//! HTTP client for a remote attestation collaborator.

use async_trait::async_trait;
use std::time::Duration;
use url::Url;

use crate::config::AttestationConfig;
use crate::transport::DataShareEnvelope;

use super::{AttestationError, Attestor, VerifyRequest, VerifyResponse};

/// Attestor that consults a collaborator's verification endpoint over HTTP.
pub struct HttpAttestor {
    endpoint: Url,
    client: reqwest::Client,
}

impl HttpAttestor {
    pub fn new(config: &AttestationConfig) -> Result<Self, AttestationError> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| AttestationError::InvalidResponse(format!("bad endpoint: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AttestationError::Unreachable(e.to_string()))?;
        Ok(Self { endpoint, client })
    }
}

#[async_trait]
impl Attestor for HttpAttestor {
    async fn verify(&self, shares: &[DataShareEnvelope]) -> Result<bool, AttestationError> {
        let request = VerifyRequest { data_shares: shares.to_vec() };

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| AttestationError::Unreachable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AttestationError::InvalidResponse(format!(
                "unexpected status {}",
                response.status()
            )));
        }

        let verdict: VerifyResponse = response
            .json()
            .await
            .map_err(|e| AttestationError::InvalidResponse(e.to_string()))?;

        tracing::debug!(
            shares = shares.len(),
            status = verdict.status,
            "Attestation verdict received"
        );
        Ok(verdict.status)
    }
}
