//! The codec-library contract (spec.md §6): "blocking `encode(raw_frame)
//! -> Vec<coded_frame>` with HRD timing for video." Codec kernels
//! themselves (H.264, MP2, AC-3, AAC, Opus, S302M) are out of scope
//! (spec.md §1 Non-goals) — these traits are the seam the real libraries
//! (x264, an AAC/MP2/AC-3 encoder crate) would be wired in behind.

use bytes::Bytes;
use obe_core::descriptor::{AudioCodecParams, VideoCodecParams};
use obe_core::frame::{AudioBlock, Picture};

use crate::error::EncodeError;

/// HRD-derived timing for one coded video access unit (spec.md §4.4,
/// GLOSSARY "HRD"). Times are expressed in seconds, matching the units
/// x264's `x264_picture_t.hrd_timing` uses; the worker rescales into the
/// 27 MHz domain at the point it builds a `CodedFrame`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HrdTiming {
    pub cpb_removal_time_s: f64,
    pub dpb_output_time_s: f64,
    pub cpb_initial_arrival_time_s: f64,
    pub cpb_final_arrival_time_s: f64,
}

/// One coded access unit as it comes out of the video codec, before the
/// worker wraps it as a `CodedFrame` (spec.md §4.4 steps 2-4).
#[derive(Debug, Clone)]
pub struct EncodedVideoUnit {
    pub data: Bytes,
    pub hrd: HrdTiming,
    pub random_access: bool,
    pub priority: bool,
}

/// Readiness + VBV parameters a video encoder exposes once its first
/// parameter set is known (spec.md §4.4 step 5, §4.5).
#[derive(Debug, Clone, Copy)]
pub struct VbvParams {
    pub vbv_buffer_size_kbit: u32,
    pub vbv_init_fill_kbit: u32,
}

/// The blocking video codec contract. Implementations own their codec
/// context; `encode`/`update_stream` are assumed reentrant per spec.md
/// §5 ("encode/decode are assumed reentrant per-context"), so a worker
/// never needs to take a library-global lock outside `open`/`close`.
pub trait VideoEncoder: Send {
    /// Encodes one picture, returning zero or more access units (an
    /// encoder may buffer for B-frame reordering before emitting
    /// anything, hence "zero-or-more").
    fn encode(&mut self, pic: &Picture, input_pts: i64) -> Result<Vec<EncodedVideoUnit>, EncodeError>;

    /// `None` until the first parameter set is known.
    fn vbv_params(&self) -> Option<VbvParams>;

    /// Live bitrate/parameter reconfiguration (spec.md §6: "optionally
    /// patched at runtime via `update_stream`").
    fn update_stream(&mut self, params: &VideoCodecParams) -> Result<(), EncodeError>;
}

/// The blocking audio codec contract. `frame_size` is the codec's fixed
/// samples-per-frame granularity (spec.md §4.4: "drain in `codec.frame_size`
/// chunks").
pub trait AudioEncoder: Send {
    fn frame_size(&self) -> u32;
    fn sample_rate(&self) -> u32;
    fn encode(&mut self, block: &AudioBlock) -> Result<Vec<Bytes>, EncodeError>;
    fn update_stream(&mut self, params: &AudioCodecParams) -> Result<(), EncodeError>;
}
