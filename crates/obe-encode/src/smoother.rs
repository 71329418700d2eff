//! The encoder-output (VBV) smoother (spec.md §4.5): a single worker
//! between the video encoder and the mux queue that absorbs encoder
//! bursts by pacing release to wall-clock time anchored to the first DTS.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use obe_core::clock::ClockBus;
use obe_core::coded::CodedFrame;
use obe_core::queue::Queue;

/// Buffers coded video frames until one VBV's worth of DTS span is
/// present, then releases them paced to wall-clock time.
pub struct EncoderOutputSmoother {
    input: Arc<Queue<CodedFrame>>,
    output: Arc<Queue<CodedFrame>>,
    clock: Arc<ClockBus>,
    temporal_vbv_size: i64,
    /// Global drop flag the input sets on a detected discontinuity
    /// (spec.md §4.9); the smoother flushes and re-arms on the next
    /// cycle when this flips to `true`.
    drop_flag: Arc<AtomicBool>,
}

struct Anchor {
    start_mpeg_time: i64,
    start_dts_time: i64,
}

impl EncoderOutputSmoother {
    pub fn new(input: Arc<Queue<CodedFrame>>, output: Arc<Queue<CodedFrame>>, clock: Arc<ClockBus>, temporal_vbv_size: i64, drop_flag: Arc<AtomicBool>) -> Self {
        EncoderOutputSmoother { input, output, clock, temporal_vbv_size, drop_flag }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        thread::Builder::new()
            .name("obe-venc-smoother".into())
            .spawn(move || self.run())
            .expect("failed to spawn encoder-output smoother thread")
    }

    fn run(self) {
        let mut pending: Vec<CodedFrame> = Vec::new();
        let mut anchor: Option<Anchor> = None;
        let mut buffer_complete = false;

        loop {
            let frame = match self.input.pop() {
                Some(f) => f,
                None => {
                    log::info!("obe-encode: encoder-output smoother input cancelled, exiting");
                    self.output.cancel();
                    return;
                }
            };

            if self.drop_flag.swap(false, Ordering::AcqRel) {
                log::warn!("obe-encode: encoder-output smoother re-arming after drop signal");
                anchor = None;
                buffer_complete = false;
                pending.clear();
            }

            pending.push(frame);

            if !buffer_complete {
                let earliest = pending.first().map(|f| f.real_dts);
                let latest = pending.last().map(|f| f.real_dts);
                if let (Some(earliest), Some(latest)) = (earliest, latest) {
                    if latest - earliest >= self.temporal_vbv_size {
                        buffer_complete = true;
                        anchor = Some(Anchor {
                            start_mpeg_time: self.clock.get_input_clock(),
                            start_dts_time: pending[0].real_dts,
                        });
                    }
                }
            }

            if buffer_complete {
                if let Some(anchor) = &anchor {
                    while !pending.is_empty() {
                        let deadline = anchor.start_mpeg_time + (pending[0].real_dts - anchor.start_dts_time);
                        self.clock.sleep_until(deadline);
                        let next = pending.remove(0);
                        if !self.output.push(next) {
                            log::warn!("obe-encode: encoder-output smoother output queue cancelled");
                            return;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn frame(dts: i64) -> CodedFrame {
        CodedFrame {
            output_stream_id: 0,
            is_video: true,
            pts: dts,
            real_pts: dts,
            real_dts: dts,
            cpb_initial_arrival_time: dts,
            cpb_final_arrival_time: dts,
            random_access: false,
            priority: false,
            duration: 0,
            data: Bytes::new(),
            scte35_opaque: None,
        }
    }

    #[test]
    fn forwards_frames_once_vbv_span_reached() {
        let input: Arc<Queue<CodedFrame>> = Arc::new(Queue::unbounded());
        let output: Arc<Queue<CodedFrame>> = Arc::new(Queue::unbounded());
        let clock = Arc::new(ClockBus::new());
        clock.tick(1_000_000);
        let drop_flag = Arc::new(AtomicBool::new(false));

        for dts in [0, 500, 1100] {
            input.push(frame(dts));
        }
        input.cancel();

        let smoother = EncoderOutputSmoother::new(input, output.clone(), clock, 1000, drop_flag);
        smoother.run();

        let mut forwarded = Vec::new();
        while let Some(f) = output.pop() {
            forwarded.push(f.real_dts);
        }
        assert_eq!(forwarded, vec![0, 500, 1100]);
    }
}
