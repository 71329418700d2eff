//! A synthetic black-frame + silence input adapter, standing in for the
//! excluded capture drivers (spec.md §1: "Capture drivers... The core
//! receives `raw_frame`s over a contract described in §6"). Matches
//! spec.md §8 scenario S1's stimulus: constant black 4:2:2 10-bit
//! pictures and 48 kHz digital silence, ticking the clock at the
//! configured frame rate.

use obe_core::descriptor::StreamType;
use obe_core::frame::{AudioBlock, PixelFormat, RawFrame, SampleFormat};

use crate::input::{DetectedStream, InputAdapter, InputSink, ProgramDescriptor};

pub struct SyntheticInput {
    pub width: u32,
    pub height: u32,
    pub frame_rate_num: u32,
    pub frame_rate_den: u32,
    pub sample_rate: u32,
    pub audio_channels: u32,
    pub frame_count: u64,
    /// If set, the adapter advances the clock by 3 seconds with no frame
    /// delivery at this frame index and calls
    /// `InputSink::signal_discontinuity` before resuming — the stimulus
    /// for spec.md §8 scenario S6 ("inject a 3s input gap").
    pub inject_gap_at_frame: Option<u64>,
}

impl SyntheticInput {
    pub fn new(width: u32, height: u32, frame_rate_num: u32, frame_rate_den: u32, sample_rate: u32, audio_channels: u32, frame_count: u64) -> Self {
        SyntheticInput { width, height, frame_rate_num, frame_rate_den, sample_rate, audio_channels, frame_count, inject_gap_at_frame: None }
    }
}

impl InputAdapter for SyntheticInput {
    fn probe(&self) -> ProgramDescriptor {
        ProgramDescriptor {
            streams: vec![
                DetectedStream {
                    input_stream_id: 0,
                    stream_type: StreamType::Video,
                    width: self.width,
                    height: self.height,
                    timebase_num: self.frame_rate_den,
                    timebase_den: self.frame_rate_num,
                    sar_num: 1,
                    sar_den: 1,
                    num_channels: 0,
                    language: String::new(),
                },
                DetectedStream {
                    input_stream_id: 1,
                    stream_type: StreamType::Audio,
                    width: 0,
                    height: 0,
                    timebase_num: 1,
                    timebase_den: self.sample_rate,
                    sar_num: 0,
                    sar_den: 0,
                    num_channels: self.audio_channels,
                    language: "eng".to_string(),
                },
            ],
        }
    }

    fn open(self: Box<Self>, sink: InputSink) {
        let ticks_per_frame = obe_core::clock::OBE_CLOCK * self.frame_rate_den as i64 / self.frame_rate_num as i64;
        let samples_per_frame = (self.sample_rate as i64 * self.frame_rate_den as i64 / self.frame_rate_num as i64) as u32;

        let mut pts: i64 = 0;
        for i in 0..self.frame_count {
            if sink.stream_queues.iter().all(|q| q.is_cancelled()) {
                log::info!("obe-engine: synthetic input observed cancelled output, stopping");
                return;
            }

            if Some(i) == self.inject_gap_at_frame {
                log::warn!("obe-engine: synthetic input injecting a discontinuity");
                sink.signal_discontinuity();
                pts += ticks_per_frame * (3 * self.frame_rate_num as i64 / self.frame_rate_den as i64);
            }

            let mut pic = obe_core::frame::Picture::blank(self.width, self.height, PixelFormat::Yuv422P10);
            pic.timebase_num = self.frame_rate_den;
            pic.timebase_den = self.frame_rate_num;
            pic.interlaced = true;
            pic.tff = true;
            let frame = RawFrame::picture(0, pts, pic);
            sink.deliver(0, frame, true);

            let audio = AudioBlock {
                sample_fmt: SampleFormat::PlanarS32,
                num_channels: self.audio_channels,
                num_samples: samples_per_frame,
                audio_data: vec![vec![0i32; samples_per_frame as usize]; self.audio_channels as usize],
            };
            let audio_frame = RawFrame::audio(1, pts, audio);
            sink.deliver(1, audio_frame, false);

            pts += ticks_per_frame;
        }

        log::info!("obe-engine: synthetic input exhausted {} frames, exiting", self.frame_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obe_core::clock::ClockBus;
    use obe_core::queue::Queue;
    use obe_core::status::InputStatus;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    #[test]
    fn probe_reports_one_video_and_one_audio_stream() {
        let input = SyntheticInput::new(1920, 1080, 25, 1, 48_000, 2, 5);
        let program = input.probe();
        assert_eq!(program.streams.len(), 2);
        assert_eq!(program.streams[0].stream_type, StreamType::Video);
        assert_eq!(program.streams[1].stream_type, StreamType::Audio);
    }

    #[test]
    fn open_delivers_exactly_frame_count_pictures() {
        let input = Box::new(SyntheticInput::new(64, 64, 25, 1, 48_000, 2, 4));
        let video_q: Arc<Queue<RawFrame>> = Arc::new(Queue::unbounded());
        let audio_q: Arc<Queue<RawFrame>> = Arc::new(Queue::unbounded());
        let sink = InputSink {
            clock: Arc::new(ClockBus::new()),
            stream_queues: vec![video_q.clone(), audio_q.clone()],
            status: Arc::new(InputStatus::default()),
            drop_flag: Arc::new(AtomicBool::new(false)),
        };
        input.open(sink);

        let mut count = 0;
        while video_q.pop().is_some() {
            count += 1;
        }
        assert_eq!(count, 4);
    }

    #[test]
    fn gap_injection_sets_drop_flag_and_advances_pts() {
        let mut input = SyntheticInput::new(64, 64, 25, 1, 48_000, 2, 3);
        input.inject_gap_at_frame = Some(1);
        let video_q: Arc<Queue<RawFrame>> = Arc::new(Queue::unbounded());
        let audio_q: Arc<Queue<RawFrame>> = Arc::new(Queue::unbounded());
        let drop_flag = Arc::new(AtomicBool::new(false));
        let sink = InputSink {
            clock: Arc::new(ClockBus::new()),
            stream_queues: vec![video_q.clone(), audio_q.clone()],
            status: Arc::new(InputStatus::default()),
            drop_flag: drop_flag.clone(),
        };
        Box::new(input).open(sink);

        assert!(drop_flag.load(std::sync::atomic::Ordering::Acquire));
        let pts: Vec<i64> = std::iter::from_fn(|| video_q.pop().map(|f| f.pts)).collect();
        assert_eq!(pts.len(), 3);
        assert!(pts[2] - pts[1] > pts[1] - pts[0]);
    }
}
