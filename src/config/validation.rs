//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, caps > 0)
//! - Check addresses and URLs actually parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: ExchangeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use alloy::primitives::Address;
use std::net::SocketAddr;
use url::Url;

use crate::config::schema::ExchangeConfig;

/// One semantic problem with a configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub problem: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.problem)
    }
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &ExchangeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError {
            field: "listener.bind_address",
            problem: format!("'{}' is not a socket address", config.listener.bind_address),
        });
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError {
            field: "listener.max_connections",
            problem: "must be greater than zero".to_string(),
        });
    }

    if config.transport.max_frame_bytes == 0 {
        errors.push(ValidationError {
            field: "transport.max_frame_bytes",
            problem: "must be greater than zero".to_string(),
        });
    }
    if config.transport.read_timeout_secs == 0 {
        errors.push(ValidationError {
            field: "transport.read_timeout_secs",
            problem: "must be greater than zero".to_string(),
        });
    }

    if Url::parse(&config.attestation.endpoint).is_err() {
        errors.push(ValidationError {
            field: "attestation.endpoint",
            problem: format!("'{}' is not a URL", config.attestation.endpoint),
        });
    }
    if config.attestation.runtime_environments.is_empty() {
        errors.push(ValidationError {
            field: "attestation.runtime_environments",
            problem: "roster must not be empty".to_string(),
        });
    }

    if Url::parse(&config.ledger.rpc_url).is_err() {
        errors.push(ValidationError {
            field: "ledger.rpc_url",
            problem: format!("'{}' is not a URL", config.ledger.rpc_url),
        });
    }
    for url in &config.ledger.failover_urls {
        if Url::parse(url).is_err() {
            errors.push(ValidationError {
                field: "ledger.failover_urls",
                problem: format!("'{url}' is not a URL"),
            });
        }
    }
    // Empty means "not configured yet"; that surfaces when the ledger
    // client connects, not here.
    if !config.ledger.contract_address.is_empty()
        && config.ledger.contract_address.parse::<Address>().is_err()
    {
        errors.push(ValidationError {
            field: "ledger.contract_address",
            problem: format!("'{}' is not an address", config.ledger.contract_address),
        });
    }
    if config.ledger.chain_id == 0 {
        errors.push(ValidationError {
            field: "ledger.chain_id",
            problem: "must be greater than zero".to_string(),
        });
    }
    if config.ledger.poll_interval_ms == 0 {
        errors.push(ValidationError {
            field: "ledger.poll_interval_ms",
            problem: "must be greater than zero".to_string(),
        });
    }

    for (field, value) in [
        ("deadlines.claim_secs", config.deadlines.claim_secs),
        ("deadlines.delivery_secs", config.deadlines.delivery_secs),
        ("deadlines.payment_secs", config.deadlines.payment_secs),
        ("deadlines.key_reveal_secs", config.deadlines.key_reveal_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError {
                field,
                problem: "must be greater than zero".to_string(),
            });
        }
    }

    if config.retry.max_attempts == 0 {
        errors.push(ValidationError {
            field: "retry.max_attempts",
            problem: "must allow at least one attempt".to_string(),
        });
    }
    if config.retry.max_delay_ms < config.retry.base_delay_ms {
        errors.push(ValidationError {
            field: "retry.max_delay_ms",
            problem: "must be at least base_delay_ms".to_string(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError {
            field: "observability.metrics_address",
            problem: format!(
                "'{}' is not a socket address",
                config.observability.metrics_address
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
