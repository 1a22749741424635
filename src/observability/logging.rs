//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the logging subsystem
//! - Honor `RUST_LOG` when set, fall back to the configured level
//!
//! # Design Decisions
//! - One subscriber per process, installed before anything logs
//! - The configured level seeds the filter; `RUST_LOG` overrides it

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` wins when present; otherwise `default_level` applies to this
/// crate only. Call once per process, before any other subsystem starts.
pub fn init(default_level: &str) {
    let default_directive = format!("fairdex={default_level}");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
