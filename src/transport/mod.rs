//! Point-to-point transport between exchange parties.
//!
//! # Responsibilities
//! - Accept inbound TCP connections with backpressure
//! - Frame protocol messages as single JSON documents per direction
//! - Buffer partial reads until a full document parses
//! - Deliver outbound payloads to a peer endpoint
//!
//! # Design Decisions
//! - One message per connection direction; a top-level JSON object is
//!   self-delimiting, so no length prefix is needed
//! - The decoder distinguishes "incomplete" from "can never parse" so a slow
//!   peer is not mistaken for a malicious one
//! - A hard frame-size cap bounds memory per connection

pub mod connection;
pub mod framing;
pub mod listener;
pub mod messages;

pub use connection::{read_message, send_message, write_message, ConnectionId, ConnectionTracker};
pub use framing::{FrameDecoder, FrameStatus};
pub use listener::Listener;
pub use messages::{DataShareEnvelope, Delivery, ShareSubmission, SubmissionAck};

use thiserror::Error;

/// Error type for transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Socket-level failure.
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
    /// Bytes that can never parse into the expected message.
    #[error("malformed message: {0}")]
    Malformed(String),
    /// Frame grew past the configured cap.
    #[error("frame of {got} bytes exceeds the {max} byte limit")]
    FrameTooLarge { got: usize, max: usize },
    /// Peer closed the connection before a complete message arrived.
    #[error("connection closed before a complete message arrived")]
    ConnectionClosed,
}

impl TransportError {
    /// True for inputs the peer sent wrong, as opposed to socket failures.
    pub fn is_malformed(&self) -> bool {
        matches!(self, TransportError::Malformed(_) | TransportError::FrameTooLarge { .. })
    }
}
