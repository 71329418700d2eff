//! The encoder stage (spec.md §4.4): codec-library contract traits, video
//! and audio encoder worker threads, and the encoder-output (VBV)
//! smoother (spec.md §4.5) that paces coded video toward the muxer.

pub mod audio;
pub mod codec;
pub mod error;
pub mod hrd;
pub mod smoother;
pub mod video;
pub mod worker;

pub use codec::{AudioEncoder, EncodedVideoUnit, HrdTiming, VbvParams, VideoEncoder};
pub use error::EncodeError;
pub use smoother::EncoderOutputSmoother;
pub use worker::{AudioEncoderWorker, VideoEncoderWorker};
