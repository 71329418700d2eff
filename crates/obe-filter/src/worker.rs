//! The filter-stage worker thread (spec.md §4.3): one per logical filter
//! chain, consuming `raw_frame`s from the input queue and addressing
//! filtered output to one or more per-encoder queues.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use obe_core::descriptor::PcmLayout;
use obe_core::frame::{FramePayload, PixelFormat, RawFrame, UserData};
use obe_core::queue::Queue;

use crate::ancillary::{encapsulate_user_data, Cdp, UserDataSubscription};
use crate::audio::split_channels;
use crate::video::convert_bit_depth;

/// Per-output-stream filter configuration: what the video path should
/// convert to, which ancillary types to encapsulate, and (for an audio
/// output) its channel layout.
#[derive(Debug, Clone)]
pub struct FilterTarget {
    pub output_stream_id: u32,
    pub video_format: Option<PixelFormat>,
    pub user_data_subscription: UserDataSubscription,
    pub pcm_layout: Option<PcmLayout>,
    pub framerate_code: u8,
}

/// Routes one filtered `RawFrame` per target to its per-encoder queue.
pub struct FilterWorker {
    input: Arc<Queue<RawFrame>>,
    targets: Vec<(FilterTarget, Arc<Queue<RawFrame>>)>,
}

impl FilterWorker {
    pub fn new(input: Arc<Queue<RawFrame>>, targets: Vec<(FilterTarget, Arc<Queue<RawFrame>>)>) -> Self {
        FilterWorker { input, targets }
    }

    /// Spawns the worker thread; returns a join handle the engine keeps
    /// to await shutdown after cancelling the input queue (spec.md §5:
    /// "no timeout semantics on internal queues").
    pub fn spawn(self) -> JoinHandle<()> {
        thread::Builder::new()
            .name("obe-filter".into())
            .spawn(move || self.run())
            .expect("failed to spawn filter worker thread")
    }

    fn run(self) {
        let mut cdps: Vec<Cdp> = self.targets.iter().map(|_| Cdp::default()).collect();
        loop {
            let frame = match self.input.pop() {
                Some(f) => f,
                None => {
                    log::info!("obe-filter: input queue cancelled, exiting");
                    for (_, out_queue) in &self.targets {
                        out_queue.cancel();
                    }
                    return;
                }
            };

            for (idx, (target, out_queue)) in self.targets.iter().enumerate() {
                if let Some(filtered) = self.filter_for_target(&frame, target, &mut cdps[idx]) {
                    if !out_queue.push(filtered) {
                        log::warn!("obe-filter: output queue for stream {} cancelled", target.output_stream_id);
                    }
                }
            }
        }
    }

    fn filter_for_target(&self, frame: &RawFrame, target: &FilterTarget, cdp: &mut Cdp) -> Option<RawFrame> {
        match &frame.payload {
            FramePayload::Picture(pic) => {
                let converted = match target.video_format {
                    Some(fmt) => convert_bit_depth(pic, fmt),
                    None => pic.clone(),
                };
                let encapsulated = encapsulate_user_data(
                    &frame.user_data,
                    target.user_data_subscription,
                    cdp,
                    target.framerate_code,
                );
                let mut user_data = Vec::new();
                for sei in encapsulated.t35_sei_payloads {
                    user_data.push(UserData::Cea708Cdp { data: sei });
                }
                if let Some((afd, is_wide)) = encapsulated.afd {
                    user_data.push(UserData::Afd { afd, is_wide });
                }
                let mut out = RawFrame::picture(frame.input_stream_id, frame.pts, converted);
                out.user_data = user_data;
                Some(out)
            }
            FramePayload::Audio(audio) => {
                let split = match &target.pcm_layout {
                    Some(layout) => split_channels(audio, layout),
                    None => audio.clone(),
                };
                Some(RawFrame::audio(frame.input_stream_id, frame.pts, split))
            }
            FramePayload::Ancillary(_) => Some(frame.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obe_core::frame::Picture;

    #[test]
    fn video_target_converts_and_encapsulates() {
        let input: Arc<Queue<RawFrame>> = Arc::new(Queue::unbounded());
        let out: Arc<Queue<RawFrame>> = Arc::new(Queue::unbounded());
        let target = FilterTarget {
            output_stream_id: 1,
            video_format: Some(PixelFormat::Yuv420P8),
            user_data_subscription: UserDataSubscription { afd: true, ..Default::default() },
            pcm_layout: None,
            framerate_code: 4,
        };
        let worker = FilterWorker::new(input.clone(), vec![(target, out.clone())]);

        let mut pic = Picture::blank(16, 16, PixelFormat::Yuv422P10);
        pic.plane[0][0] = 512;
        let mut frame = RawFrame::picture(0, 0, pic);
        frame.user_data.push(UserData::Afd { afd: 8, is_wide: true });
        input.push(frame);
        input.cancel();

        let handle = std::thread::spawn(move || worker.run());
        handle.join().unwrap();

        let produced = out.pop().unwrap();
        let pic = produced.as_picture().unwrap();
        assert_eq!(pic.format, PixelFormat::Yuv420P8);
        assert!(produced.user_data.iter().any(|u| matches!(u, UserData::Afd { .. })));
    }
}
