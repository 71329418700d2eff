use thiserror::Error;

/// Fatal startup errors (spec.md §7: "Fatal startup (bad config, device
/// open failure)... everything else degrades and logs rather than
/// aborting"). Per-frame and per-stage runtime errors stay inside their
/// worker threads as log lines; only failures that prevent a worker from
/// ever starting surface here.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no streams configured")]
    NoStreams,

    #[error("video encoder failed to open: {0}")]
    VideoEncoderOpenFailed(#[from] obe_encode::EncodeError),

    #[error("output socket setup failed for {host}:{port}: {source}")]
    OutputOpenFailed { host: String, port: u16, source: std::io::Error },

    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),
}
