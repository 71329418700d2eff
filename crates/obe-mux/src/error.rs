use thiserror::Error;

/// Errors from the MPEG-TS writer and multiplexer stage (spec.md §4.6,
/// §6's "MPEG-TS library contract").
#[derive(Debug, Error)]
pub enum MuxError {
    #[error("unknown output stream id {0}")]
    UnknownStream(u32),

    #[error("PES packet length {0} exceeds 16-bit field")]
    PesTooLarge(usize),

    #[error(transparent)]
    Core(#[from] obe_core::Error),
}
