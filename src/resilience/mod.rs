//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Ledger call:
//!     → retry.rs (classify result, retry transient failures)
//!     → backoff.rs (exponential delay with jitter between attempts)
//!     → On permanent failure or exhausted budget: session aborts
//! ```
//!
//! # Design Decisions
//! - Every external call already carries a deadline; retries never stretch one
//! - Retries reuse the identical payload, so a retried publish cannot diverge
//!   from what was first attempted
//! - Only the ledger's transient class is retryable; malformed input and
//!   reverts fail fast

pub mod backoff;
pub mod retry;

pub use backoff::calculate_backoff;
pub use retry::{retry_transient, RetryPolicy};
