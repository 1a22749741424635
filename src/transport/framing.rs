//! Incremental JSON framing.
//!
//! Protocol messages travel as exactly one JSON document per connection
//! direction. TCP gives no message boundaries, so the decoder accumulates
//! chunks and re-attempts a parse after each one. A parse failure at the end
//! of the buffer means more bytes may still complete the document; any other
//! failure means the bytes can never parse and the peer is at fault.

use serde::de::DeserializeOwned;

use super::TransportError;

/// Outcome of feeding one chunk into the decoder.
#[derive(Debug)]
pub enum FrameStatus<M> {
    /// A full document parsed into a message.
    Complete(M),
    /// The buffer holds a prefix of a potentially valid document.
    NeedMoreData,
}

/// Accumulates raw chunks until one complete JSON document parses.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    max_frame_bytes: usize,
}

impl FrameDecoder {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self { buf: Vec::new(), max_frame_bytes }
    }

    /// Bytes currently buffered without a complete parse.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Append a chunk and try to parse the buffer as a complete document.
    ///
    /// Returns `Malformed` once the buffer can no longer become a valid
    /// document no matter what else arrives, and `FrameTooLarge` when the
    /// accumulated bytes pass the cap.
    pub fn feed<M: DeserializeOwned>(&mut self, chunk: &[u8]) -> Result<FrameStatus<M>, TransportError> {
        let total = self.buf.len() + chunk.len();
        if total > self.max_frame_bytes {
            return Err(TransportError::FrameTooLarge { got: total, max: self.max_frame_bytes });
        }
        self.buf.extend_from_slice(chunk);

        match serde_json::from_slice::<M>(&self.buf) {
            Ok(message) => {
                self.buf.clear();
                Ok(FrameStatus::Complete(message))
            }
            Err(e) if e.is_eof() => Ok(FrameStatus::NeedMoreData),
            Err(e) => Err(TransportError::Malformed(e.to_string())),
        }
    }
}
