use thiserror::Error;

/// Errors from the codec-library contract (spec.md §6) and the encoder
/// workers built on top of it. Per-frame codec rejection is a transient
/// error (spec.md §7): the worker logs it and drops the frame rather than
/// propagating a `Result` out of its (detached) thread loop.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("codec open failed: {0}")]
    OpenFailed(String),

    #[error("codec rejected frame: {0}")]
    FrameRejected(String),

    #[error("invalid codec parameters: {0}")]
    InvalidParams(String),

    #[error(transparent)]
    Core(#[from] obe_core::Error),
}
