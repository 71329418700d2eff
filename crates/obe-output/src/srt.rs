//! SRT output contract stub (spec.md §4.8.7): "Alternative handshake +
//! encrypted transport. Same payload handoff contract; owns its own
//! socket and control-plane thread." No SRT implementation ships in this
//! dependency stack (the retrieval pack carries no SRT crate), so this
//! is the trait boundary a real transport would plug into, matching the
//! handoff contract every other `obe-output` transport already
//! implements (`send_batch`).

use bytes::Bytes;

use crate::error::OutputError;

/// The payload handoff every IP output transport implements: hand it
/// one `TS_PACKETS_SIZE` batch at a time.
pub trait OutputTransport: Send {
    fn send_batch(&mut self, payload: &Bytes) -> Result<(), OutputError>;
}

/// Contract placeholder: constructing one signals the caller configured
/// an SRT destination, but sending through it is not implemented.
pub struct SrtTransport {
    pub destination: String,
}

impl SrtTransport {
    pub fn new(destination: String) -> Self {
        SrtTransport { destination }
    }
}

impl OutputTransport for SrtTransport {
    fn send_batch(&mut self, _payload: &Bytes) -> Result<(), OutputError> {
        Err(OutputError::InvalidUri(format!("srt transport not implemented for {}", self.destination)))
    }
}
