//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every subsystem emits:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (session, ledger and attestation counters)
//!
//! Sinks:
//!     → stdout (one log line per exchange step)
//!     → Prometheus scrape endpoint (when enabled)
//! ```
//!
//! # Design Decisions
//! - Every log line names the session or connection it belongs to
//! - Recording a metric never blocks protocol work
//! - Key material never reaches either sink

pub mod logging;
pub mod metrics;
