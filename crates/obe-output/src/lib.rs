//! The IP output stage (spec.md §4.8): UDP/RTP transport, ProMPEG COP3
//! and FECFRAME LDPC-Staircase FEC, RTCP-based ARQ, duplication delay,
//! the SRT contract stub, and the output URI grammar.

pub mod arq;
pub mod error;
pub mod fec;
pub mod rtp;
pub mod socket;
pub mod srt;
pub mod uri;
pub mod worker;

pub use error::OutputError;
pub use uri::parse_output_uri;
pub use worker::OutputWorker;
