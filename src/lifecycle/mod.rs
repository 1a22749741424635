//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain sessions → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM or Ctrl+C → trigger the shutdown broadcast
//! ```
//!
//! # Design Decisions
//! - Accepting stops before draining, so the in-flight set only shrinks
//! - Sessions past the commit point always run to a terminal state

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::{trigger_on_signal, wait_for_signal};
