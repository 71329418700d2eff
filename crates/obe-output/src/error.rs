use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("invalid output URI: {0}")]
    InvalidUri(String),

    #[error("socket setup failed: {0}")]
    SocketSetup(#[source] std::io::Error),

    #[error(transparent)]
    Core(#[from] obe_core::Error),
}
