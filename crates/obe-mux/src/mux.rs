//! The multiplexer worker (spec.md §4.6): the single thread that turns
//! per-stream coded frames into `muxed_data` batches.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use obe_core::coded::CodedFrame;
use obe_core::muxed::MuxedData;
use obe_core::queue::Queue;

use crate::ts::TsWriter;

struct Anchor {
    first_video_pts: i64,
    first_video_real_pts: i64,
}

/// Sentinel `MuxRateUpdate` value meaning "nothing pending" (spec.md §4.6:
/// "on a flag set externally, re-arm the TS library with updated
/// muxrate" — open question in spec.md §9 treats this as the sole
/// supported live-reconfiguration path).
const NO_PENDING_MUXRATE: u32 = 0;

/// Handle `obe-engine` holds to request a live muxrate change; the
/// multiplexer thread picks it up on its next iteration rather than
/// being called into directly (it owns the only `TsWriter` instance).
#[derive(Clone)]
pub struct MuxRateUpdate(Arc<AtomicU32>);

impl MuxRateUpdate {
    pub fn new() -> Self {
        MuxRateUpdate(Arc::new(AtomicU32::new(NO_PENDING_MUXRATE)))
    }

    /// Requests a muxrate change, in bits/sec. `0` is not a valid muxrate
    /// and is rejected rather than silently colliding with the sentinel.
    pub fn request(&self, muxrate_bps: u32) {
        if muxrate_bps != NO_PENDING_MUXRATE {
            self.0.store(muxrate_bps, Ordering::Release);
        }
    }

    fn take_pending(&self) -> Option<u32> {
        match self.0.swap(NO_PENDING_MUXRATE, Ordering::AcqRel) {
            NO_PENDING_MUXRATE => None,
            bps => Some(bps),
        }
    }
}

impl Default for MuxRateUpdate {
    fn default() -> Self {
        Self::new()
    }
}

/// Consumes coded video frames from `video_input` and coded non-video
/// frames from `non_video_inputs`, rescales non-video timestamps onto the
/// video PTS timeline, and hands DTS-selected batches to a `TsWriter`.
pub struct Multiplexer {
    video_input: Arc<Queue<CodedFrame>>,
    non_video_inputs: Vec<Arc<Queue<CodedFrame>>>,
    output: Arc<Queue<MuxedData>>,
    writer: TsWriter,
    drop_flag: Arc<AtomicBool>,
    muxrate_update: MuxRateUpdate,
}

impl Multiplexer {
    pub fn new(
        video_input: Arc<Queue<CodedFrame>>,
        non_video_inputs: Vec<Arc<Queue<CodedFrame>>>,
        output: Arc<Queue<MuxedData>>,
        writer: TsWriter,
        drop_flag: Arc<AtomicBool>,
        muxrate_update: MuxRateUpdate,
    ) -> Self {
        Multiplexer { video_input, non_video_inputs, output, writer, drop_flag, muxrate_update }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        thread::Builder::new()
            .name("obe-mux".into())
            .spawn(move || self.run())
            .expect("failed to spawn multiplexer thread")
    }

    /// Rescales a non-video frame's timestamps onto the video timeline:
    /// `stream_pts - first_video_pts + first_video_real_pts` (spec.md
    /// §4.6). Returns `None` when the frame is "too early" (its original
    /// PTS precedes the first video frame ever seen) and must be
    /// discarded before anchoring, per spec.md §4.6.
    fn rescale(anchor: &Anchor, mut frame: CodedFrame) -> Option<CodedFrame> {
        if frame.pts < anchor.first_video_pts {
            return None;
        }
        let rescaled = frame.pts - anchor.first_video_pts + anchor.first_video_real_pts;
        frame.real_pts = rescaled;
        frame.real_dts = rescaled;
        Some(frame)
    }

    fn run(mut self) {
        let mut anchor: Option<Anchor> = None;
        let mut pending_non_video: Vec<CodedFrame> = Vec::new();

        loop {
            let video_frame = match self.video_input.pop() {
                Some(f) => f,
                None => {
                    log::info!("obe-mux: video input cancelled, exiting");
                    self.output.cancel();
                    return;
                }
            };

            if self.drop_flag.swap(false, Ordering::AcqRel) {
                log::warn!("obe-mux: re-anchoring after drop signal");
                anchor = None;
                pending_non_video.clear();
            }

            if let Some(muxrate_bps) = self.muxrate_update.take_pending() {
                log::info!("obe-mux: live muxrate reconfigure to {muxrate_bps} bps");
                self.writer.update_muxrate(muxrate_bps);
            }

            let anchor = anchor.get_or_insert_with(|| Anchor { first_video_pts: video_frame.pts, first_video_real_pts: video_frame.real_pts });

            for input in &self.non_video_inputs {
                for frame in input.drain_all() {
                    if let Some(rescaled) = Self::rescale(anchor, frame) {
                        pending_non_video.push(rescaled);
                    }
                }
            }

            let video_dts = video_frame.real_dts;
            let mut batch: Vec<CodedFrame> = Vec::new();
            let mut remaining = Vec::with_capacity(pending_non_video.len());
            for frame in pending_non_video.drain(..) {
                if frame.real_dts <= video_dts {
                    batch.push(frame);
                } else {
                    remaining.push(frame);
                }
            }
            pending_non_video = remaining;
            batch.push(video_frame);
            batch.sort_by_key(|f| f.real_dts);

            let muxed = self.writer.write(&batch);
            if !self.output.push(muxed) {
                log::warn!("obe-mux: output queue cancelled");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ts::{TsStreamConfig, TsWriterConfig};
    use bytes::Bytes;
    use obe_core::descriptor::StreamFormat;

    fn coded(output_stream_id: u32, is_video: bool, pts: i64, real_pts: i64, data: &[u8]) -> CodedFrame {
        CodedFrame {
            output_stream_id,
            is_video,
            pts,
            real_pts,
            real_dts: real_pts,
            cpb_initial_arrival_time: real_pts,
            cpb_final_arrival_time: real_pts,
            random_access: is_video,
            priority: is_video,
            duration: if is_video { 0 } else { 1000 },
            data: Bytes::copy_from_slice(data),
            scte35_opaque: None,
        }
    }

    fn writer() -> TsWriter {
        let streams = vec![
            TsStreamConfig { output_stream_id: 1, pid: 0x100, format: StreamFormat::VideoAvc },
            TsStreamConfig { output_stream_id: 2, pid: 0x101, format: StreamFormat::AudioMp2 },
        ];
        TsWriter::new(TsWriterConfig::new(1, 0x1000, 0x100, 6_000_000, streams))
    }

    #[test]
    fn too_early_non_video_frame_is_discarded_before_anchoring() {
        let video_input: Arc<Queue<CodedFrame>> = Arc::new(Queue::unbounded());
        let audio_input: Arc<Queue<CodedFrame>> = Arc::new(Queue::unbounded());
        let output: Arc<Queue<MuxedData>> = Arc::new(Queue::unbounded());

        audio_input.push(coded(2, false, -5_000, -5_000, &[9, 9]));
        video_input.push(coded(1, true, 10_000, 27_000, &[1, 2, 3]));
        video_input.cancel();
        audio_input.cancel();

        let drop_flag = Arc::new(AtomicBool::new(false));
        let mux = Multiplexer::new(video_input, vec![audio_input], output.clone(), writer(), drop_flag, MuxRateUpdate::new());
        mux.run();

        let muxed = output.pop().expect("one muxed batch");
        assert!(muxed.packet_count() >= 1);
        assert!(output.pop().is_none());
    }

    #[test]
    fn non_video_rescaled_onto_video_anchor() {
        let anchor = Anchor { first_video_pts: 10_000, first_video_real_pts: 27_000 };
        let audio = coded(2, false, 10_500, 10_500, &[1]);
        let rescaled = Multiplexer::rescale(&anchor, audio).expect("not too early");
        assert_eq!(rescaled.real_dts, 10_500 - 10_000 + 27_000);
    }

    #[test]
    fn pending_muxrate_request_is_applied_once() {
        let update = MuxRateUpdate::new();
        assert!(update.take_pending().is_none());
        update.request(4_000_000);
        assert_eq!(update.take_pending(), Some(4_000_000));
        assert!(update.take_pending().is_none());
    }

    #[test]
    fn live_muxrate_reconfigure_updates_writer_before_next_batch() {
        let video_input: Arc<Queue<CodedFrame>> = Arc::new(Queue::unbounded());
        let output: Arc<Queue<MuxedData>> = Arc::new(Queue::unbounded());

        video_input.push(coded(1, true, 0, 0, &[1, 2, 3]));
        video_input.cancel();

        let update = MuxRateUpdate::new();
        update.request(8_000_000);
        let drop_flag = Arc::new(AtomicBool::new(false));
        let mux = Multiplexer::new(video_input, vec![], output.clone(), writer(), drop_flag, update.clone());
        mux.run();

        assert!(update.take_pending().is_none());
        assert!(output.pop().is_some());
    }
}
