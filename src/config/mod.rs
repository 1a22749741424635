//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (read and deserialize)
//!     → validation.rs (semantic checks, every problem collected)
//!     → ExchangeConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - Every field has a default, so an empty file is a valid config
//! - Serde handles shape; validation.rs handles meaning

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AttestationConfig, DeadlineConfig, ExchangeConfig, LedgerConfig, ListenerConfig,
    ObservabilityConfig, RetryConfig, TransportConfig,
};
pub use validation::{validate_config, ValidationError};
