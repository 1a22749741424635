//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the exchange
//! node. All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for an exchange node.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ExchangeConfig {
    /// Listener configuration for inbound share submissions.
    pub listener: ListenerConfig,

    /// Transport framing and timeout settings.
    pub transport: TransportConfig,

    /// Attestation collaborator settings.
    pub attestation: AttestationConfig,

    /// Escrow ledger settings.
    pub ledger: LedgerConfig,

    /// Protocol phase deadlines.
    pub deadlines: DeadlineConfig,

    /// Retry configuration for transient ledger failures.
    pub retry: RetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:10001").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:10001".to_string(),
            max_connections: 256,
        }
    }
}

/// Transport framing and timeout settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Hard cap on a single framed message, in bytes.
    pub max_frame_bytes: usize,

    /// How long to wait for a complete inbound message.
    pub read_timeout_secs: u64,

    /// How long to wait when opening an outbound delivery connection.
    pub connect_timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: 1024 * 1024,
            read_timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

/// Attestation collaborator settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AttestationConfig {
    /// Verification endpoint URL.
    pub endpoint: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,

    /// Runtime environment roster, indexed by owner ID. Used when this
    /// process hosts the collaborator itself.
    pub runtime_environments: Vec<String>,
}

impl Default for AttestationConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8000/verify".to_string(),
            timeout_secs: 10,
            runtime_environments: (0..10).map(|i| format!("env{i}")).collect(),
        }
    }
}

/// Escrow ledger settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs.
    pub failover_urls: Vec<String>,

    /// Chain ID (e.g., 1 for Ethereum mainnet, 31337 for local Anvil).
    pub chain_id: u64,

    /// Escrow contract address.
    pub contract_address: String,

    /// Per-request RPC timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Blocks of depth before a transaction or event counts as settled.
    pub confirmation_blocks: u64,

    /// How long to wait for a submitted transaction to confirm.
    pub confirmation_timeout_secs: u64,

    /// Event poll interval in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            failover_urls: Vec::new(),
            chain_id: 31337,
            contract_address: String::new(),
            rpc_timeout_secs: 10,
            confirmation_blocks: 1,
            confirmation_timeout_secs: 60,
            poll_interval_ms: 1000,
        }
    }
}

/// Protocol phase deadlines.
///
/// Each bounds how long a session sits in one waiting state before it gives
/// up and aborts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeadlineConfig {
    /// Seller: waiting for a buyer to claim an endpoint.
    /// Buyer: waiting for a seller offer to appear.
    pub claim_secs: u64,

    /// Buyer: waiting for the ciphertext payload to arrive.
    pub delivery_secs: u64,

    /// Seller: waiting for the payment event after delivery.
    pub payment_secs: u64,

    /// Buyer: waiting for the key reveal after paying.
    pub key_reveal_secs: u64,
}

impl Default for DeadlineConfig {
    fn default() -> Self {
        Self {
            claim_secs: 60,
            delivery_secs: 60,
            payment_secs: 300,
            key_reveal_secs: 300,
        }
    }
}

/// Retry configuration for transient ledger failures.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first included.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let config = ExchangeConfig::default();
        assert_eq!(config.listener.bind_address, "0.0.0.0:10001");
        assert_eq!(config.transport.max_frame_bytes, 1024 * 1024);
        assert_eq!(config.ledger.chain_id, 31337);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.attestation.runtime_environments.len(), 10);
        assert_eq!(config.attestation.runtime_environments[0], "env0");
    }

    #[test]
    fn minimal_toml_fills_defaults() {
        let config: ExchangeConfig = toml::from_str(
            r#"
            [listener]
            bind_address = "127.0.0.1:7000"

            [ledger]
            contract_address = "0x5FbDB2315678afecb367f032d93F642f64180aa3"
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.bind_address, "127.0.0.1:7000");
        assert_eq!(config.listener.max_connections, 256);
        assert_eq!(
            config.ledger.contract_address,
            "0x5FbDB2315678afecb367f032d93F642f64180aa3"
        );
        assert_eq!(config.ledger.rpc_url, "http://localhost:8545");
        assert_eq!(config.deadlines.payment_secs, 300);
    }
}
