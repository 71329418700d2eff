//! `EngineConfig` (spec.md §6: "Configured state: none persistent; all
//! configuration supplied at start via structured descriptors"). A plain
//! `serde`-deserializable struct, the same shape a daemon's RPC layer
//! (explicitly out of scope, spec.md §1) would decode off the wire before
//! handing it to [`crate::Engine::start`].

use serde::{Deserialize, Serialize};

use obe_core::descriptor::{OutputDescriptor, StreamDescriptor};

/// The video format the synthetic/real input adapter is expected to
/// deliver (spec.md §6: "4:2:2 10-bit planar... SAR, framerate-as-
/// timebase"). `obe-engine` needs this up front to size queues and open
/// the video encoder; a real capture driver would instead report it via
/// `InputAdapter::probe`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoFormat {
    pub width: u32,
    pub height: u32,
    pub frame_rate_num: u32,
    pub frame_rate_den: u32,
    pub interlaced: bool,
}

impl Default for VideoFormat {
    /// 1080i50 (spec.md §8 scenario S1): 25 fps, interlaced, two fields
    /// per frame period.
    fn default() -> Self {
        VideoFormat { width: 1920, height: 1080, frame_rate_num: 25, frame_rate_den: 1, interlaced: true }
    }
}

/// Bounded-queue capacity applied uniformly between stages (spec.md
/// §4.1). The muxer's own input queue is always unbounded (spec.md
/// §4.1: "the unbounded variant used for muxer input"), so this value
/// does not apply there.
fn default_queue_capacity() -> usize {
    64
}

/// Top-level engine configuration: the program's video format, the
/// elementary streams to encode (spec.md §3 `stream descriptor`), and
/// the IP outputs to fan coded transport-stream batches toward (spec.md
/// §3 `output descriptor`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub video_format: VideoFormat,
    pub audio_sample_rate: u32,
    pub program_number: u16,
    pub pmt_pid: u16,
    pub pcr_pid: u16,
    pub muxrate_bps: u32,
    pub streams: Vec<StreamDescriptor>,
    pub outputs: Vec<OutputDescriptor>,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl EngineConfig {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}
