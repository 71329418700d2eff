//! `coded_frame` (spec.md §3): the output of one encoder worker, queued to
//! the multiplexer (by way of the encoder-output smoother for video).

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A single encoded access unit ready for the multiplexer.
///
/// Invariant (spec.md §3): for video frames, `real_dts <= real_pts` and
/// `cpb_initial_arrival_time <= cpb_final_arrival_time <= real_dts`. See
/// `CodedFrame::check_video_invariants`, used by the encoder worker before
/// a frame is pushed and by tests (spec.md §8, property 2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodedFrame {
    pub output_stream_id: u32,
    pub is_video: bool,
    /// Wall PTS carried over verbatim from the originating input frame,
    /// in `OBE_CLOCK` ticks; this is what the muxer uses to rescale
    /// non-video streams onto the video DTS timeline (spec.md §4.6).
    pub pts: i64,
    /// HRD-derived values for video (27 MHz); for non-video streams these
    /// equal `pts` until the muxer rescales them.
    pub real_pts: i64,
    pub real_dts: i64,
    pub cpb_initial_arrival_time: i64,
    pub cpb_final_arrival_time: i64,
    pub random_access: bool,
    pub priority: bool,
    /// Non-video frame duration in 27 MHz ticks (spec.md §3).
    pub duration: i64,
    pub data: Bytes,
    pub scte35_opaque: Option<Bytes>,
}

impl CodedFrame {
    pub fn video_invariants_hold(&self) -> bool {
        self.real_dts <= self.real_pts
            && self.cpb_initial_arrival_time <= self.cpb_final_arrival_time
            && self.cpb_final_arrival_time <= self.real_dts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(real_dts: i64, real_pts: i64, cpb_init: i64, cpb_final: i64) -> CodedFrame {
        CodedFrame {
            output_stream_id: 0,
            is_video: true,
            pts: real_pts,
            real_pts,
            real_dts,
            cpb_initial_arrival_time: cpb_init,
            cpb_final_arrival_time: cpb_final,
            random_access: false,
            priority: false,
            duration: 0,
            data: Bytes::new(),
            scte35_opaque: None,
        }
    }

    #[test]
    fn ordered_times_satisfy_invariant() {
        assert!(frame(100, 200, 10, 90).video_invariants_hold());
    }

    #[test]
    fn dts_after_pts_violates_invariant() {
        assert!(!frame(300, 200, 10, 90).video_invariants_hold());
    }

    #[test]
    fn cpb_final_after_dts_violates_invariant() {
        assert!(!frame(100, 200, 10, 150).video_invariants_hold());
    }
}
