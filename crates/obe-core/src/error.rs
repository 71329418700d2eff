use thiserror::Error;

/// Shared error type for the data-model layer. Stage-specific crates define
/// their own error enums and wrap this one where a pipeline primitive
/// (queue, descriptor, clock) is the failure source.
#[derive(Debug, Error)]
pub enum Error {
    #[error("queue cancelled")]
    QueueCancelled,

    #[error("invalid output URI: {0}")]
    InvalidOutputUri(String),

    #[error("malformed descriptor: {0}")]
    MalformedDescriptor(String),

    #[error("allocation failed for {0}")]
    AllocationFailed(&'static str),
}
