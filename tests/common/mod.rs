//! Shared fixtures for exchange integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use alloy::primitives::Address;
use tokio::net::TcpStream;

use fairdex::attestation::service::{expected_signature, router};
use fairdex::attestation::{HttpAttestor, RuntimeEnvironments};
use fairdex::config::{AttestationConfig, ListenerConfig};
use fairdex::exchange::{BuyerSettings, SellerSettings};
use fairdex::resilience::RetryPolicy;
use fairdex::transport::{
    read_message, write_message, DataShareEnvelope, ShareSubmission, SubmissionAck, TransportError,
};

pub const SELLER: Address = Address::repeat_byte(0xaa);
pub const BUYER: Address = Address::repeat_byte(0xbb);

/// Envelope signed the way the stock roster expects for `user_id`.
pub fn envelope(share: &str, user_id: u32) -> DataShareEnvelope {
    DataShareEnvelope {
        share: share.to_string(),
        signature: expected_signature(share, &format!("env{user_id}")),
        user_id,
    }
}

/// A validly signed batch of `count` shares at the given asking price.
pub fn submission(count: u32, price: u64) -> ShareSubmission {
    ShareSubmission {
        data_shares: (0..count).map(|i| envelope(&format!("share-{i}"), i)).collect(),
        price,
    }
}

pub fn listener_config() -> ListenerConfig {
    ListenerConfig {
        bind_address: "127.0.0.1:0".to_string(),
        max_connections: 8,
    }
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay_ms: 1,
        max_delay_ms: 5,
    }
}

/// Seller settings tightened for test turnaround.
pub fn fast_seller_settings() -> SellerSettings {
    SellerSettings {
        max_frame_bytes: 1024 * 1024,
        read_timeout: Duration::from_secs(5),
        connect_timeout: Duration::from_secs(1),
        claim_deadline: Duration::from_secs(5),
        payment_deadline: Duration::from_secs(5),
        poll_interval: Duration::from_millis(10),
        retry: fast_retry(),
    }
}

/// Buyer settings tightened for test turnaround.
pub fn fast_buyer_settings() -> BuyerSettings {
    BuyerSettings {
        bind_ip: "127.0.0.1".to_string(),
        bind_port: 0,
        seller_index: 0,
        max_frame_bytes: 1024 * 1024,
        offer_deadline: Duration::from_secs(5),
        delivery_deadline: Duration::from_secs(5),
        key_deadline: Duration::from_secs(5),
        poll_interval: Duration::from_millis(10),
        retry: fast_retry(),
    }
}

/// Send one submission and wait for whatever the seller answers.
pub async fn try_submit(
    addr: SocketAddr,
    submission: &ShareSubmission,
) -> Result<SubmissionAck, TransportError> {
    let mut stream = TcpStream::connect(addr).await?;
    write_message(&mut stream, submission).await?;
    read_message(&mut stream, 64 * 1024).await
}

/// Send one submission that is expected to be acked.
#[allow(dead_code)]
pub async fn submit(addr: SocketAddr, submission: &ShareSubmission) -> SubmissionAck {
    try_submit(addr, submission)
        .await
        .expect("submission should be acked")
}

/// Serve the verification endpoint on an ephemeral port; returns its URL.
#[allow(dead_code)]
pub async fn spawn_attestor() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(RuntimeEnvironments::default());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}/verify")
}

/// HTTP attestor client pointed at a spawned verification endpoint.
#[allow(dead_code)]
pub fn http_attestor(endpoint: String) -> HttpAttestor {
    HttpAttestor::new(&AttestationConfig {
        endpoint,
        timeout_secs: 2,
        runtime_environments: Vec::new(),
    })
    .expect("attestor config should parse")
}
