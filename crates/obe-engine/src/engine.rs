//! The `Engine` handle (spec.md §5, §6): wires one `InputAdapter` through
//! the filter, encode, mux, and IP output stages per `EngineConfig`, and
//! owns every worker thread's `JoinHandle` so `stop()` can cancel queues
//! from the outside in and join everything cleanly.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use obe_core::clock::ClockBus;
use obe_core::coded::CodedFrame;
use obe_core::descriptor::{AudioCodecParams, StreamFormat, StreamType};
use obe_core::frame::RawFrame;
use obe_core::muxed::{BufRef, MuxedData};
use obe_core::queue::Queue;
use obe_core::status::{EncoderStatus, InputStatus, OutputStatus};

use obe_encode::{AudioEncoderWorker, EncoderOutputSmoother, VideoEncoderWorker};
use obe_filter::{FilterTarget, FilterWorker};
use obe_mux::{Multiplexer, MuxOutputSmoother, MuxRateUpdate, TsStreamConfig, TsWriter, TsWriterConfig};
use obe_output::OutputWorker;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::input::{InputAdapter, InputSink};
use crate::status::EngineStatus;

/// The video VBV temporal span the encoder-output smoother buffers
/// before release (spec.md §4.5). One second is the conservative
/// default the teacher's own smoother uses; a real deployment would
/// derive it from the configured VBV buffer size.
const DEFAULT_TEMPORAL_VBV_27MHZ: i64 = obe_core::clock::OBE_CLOCK;

/// A running pipeline. `start` spawns every worker thread named in
/// spec.md §5 and returns immediately; `stop` cancels queues from the
/// input side outward and joins every thread before returning.
pub struct Engine {
    drop_flag: Arc<AtomicBool>,
    stream_queues: Vec<Arc<Queue<RawFrame>>>,
    output_queues: Vec<Arc<Queue<BufRef>>>,
    muxrate_update: MuxRateUpdate,
    status: Arc<EngineStatus>,
    handles: Vec<JoinHandle<()>>,
    input_handle: Option<JoinHandle<()>>,
}

impl Engine {
    /// Assembles and starts the pipeline described by `config`, driven by
    /// `input`. Mirrors spec.md §5's worker list: one filter worker and
    /// one encoder worker per configured stream, a single encoder-output
    /// smoother for the video stream, one multiplexer, one mux-output
    /// smoother, a fan-out stage, and one output worker per configured
    /// output.
    pub fn start(config: EngineConfig, input: Box<dyn InputAdapter>) -> Result<Self, EngineError> {
        if config.streams.is_empty() {
            return Err(EngineError::NoStreams);
        }

        let clock = Arc::new(ClockBus::new());
        let drop_flag = Arc::new(AtomicBool::new(false));
        let input_status = Arc::new(InputStatus::default());
        let encoder_status = Arc::new(EncoderStatus::default());

        let mut handles = Vec::new();

        let program = input.probe();
        let mut stream_queues = Vec::new();
        let mut filter_targets_by_source: Vec<Vec<(FilterTarget, Arc<Queue<RawFrame>>)>> = program.streams.iter().map(|_| Vec::new()).collect();
        let mut encoder_input_queues = Vec::new();

        for (idx, descriptor) in config.streams.iter().enumerate() {
            let output_stream_id = (idx + 1) as u32;
            let source_index = match descriptor.stream_type {
                StreamType::Video => 0,
                _ => 1,
            };
            let filter_target = FilterTarget {
                output_stream_id,
                video_format: None,
                user_data_subscription: Default::default(),
                pcm_layout: descriptor.pcm_layout.clone(),
                framerate_code: 0,
            };
            let encoder_input: Arc<Queue<RawFrame>> = Arc::new(Queue::bounded(config.queue_capacity));
            if let Some(targets) = filter_targets_by_source.get_mut(source_index) {
                targets.push((filter_target, encoder_input.clone()));
            }
            encoder_input_queues.push(encoder_input);
        }

        for targets in filter_targets_by_source.into_iter() {
            if targets.is_empty() {
                continue;
            }
            let input_queue: Arc<Queue<RawFrame>> = Arc::new(Queue::bounded(config.queue_capacity));
            stream_queues.push(input_queue.clone());
            handles.push(FilterWorker::new(input_queue, targets).spawn());
        }
        // `stream_queues` must line up 1:1 with `program.streams` even when a
        // detected stream has no configured target, so the input adapter
        // always has somewhere to push.
        while stream_queues.len() < program.streams.len() {
            stream_queues.push(Arc::new(Queue::bounded(config.queue_capacity)));
        }

        let video_coded: Arc<Queue<CodedFrame>> = Arc::new(Queue::bounded(config.queue_capacity));
        let mut non_video_coded: Vec<Arc<Queue<CodedFrame>>> = Vec::new();
        let mut ts_streams = Vec::new();

        for (idx, descriptor) in config.streams.iter().enumerate() {
            let output_stream_id = (idx + 1) as u32;
            let encoder_input = encoder_input_queues[idx].clone();
            ts_streams.push(TsStreamConfig { output_stream_id, pid: descriptor.output_pid, format: descriptor.stream_format });

            match descriptor.stream_type {
                StreamType::Video => {
                    let params = descriptor.video_params.clone().unwrap_or_default();
                    let encoder = obe_encode::video::X264Encoder::open(
                        config.video_format.width,
                        config.video_format.height,
                        obe_core::frame::PixelFormat::Yuv422P10,
                        config.video_format.frame_rate_num,
                        config.video_format.frame_rate_den,
                        &params,
                    )?;
                    let worker = VideoEncoderWorker::new(output_stream_id, encoder_input, video_coded.clone(), encoder, encoder_status.clone());
                    handles.push(worker.spawn());
                }
                _ => {
                    let audio_out: Arc<Queue<CodedFrame>> = Arc::new(Queue::unbounded());
                    spawn_audio_encoder(descriptor.stream_format, descriptor.audio_params.clone().unwrap_or_default(), config.audio_sample_rate, output_stream_id, encoder_input, audio_out.clone(), &mut handles)?;
                    non_video_coded.push(audio_out);
                }
            }
        }

        let smoothed_video: Arc<Queue<CodedFrame>> = Arc::new(Queue::unbounded());
        handles.push(EncoderOutputSmoother::new(video_coded, smoothed_video.clone(), clock.clone(), DEFAULT_TEMPORAL_VBV_27MHZ, drop_flag.clone()).spawn());

        let muxed: Arc<Queue<MuxedData>> = Arc::new(Queue::unbounded());
        let muxrate_update = MuxRateUpdate::new();
        let writer = TsWriter::new(TsWriterConfig::new(config.program_number, config.pmt_pid, config.pcr_pid, config.muxrate_bps, ts_streams));
        let mux = Multiplexer::new(smoothed_video, non_video_coded, muxed.clone(), writer, drop_flag.clone(), muxrate_update.clone());
        handles.push(mux.spawn());

        let paced: Arc<Queue<BufRef>> = Arc::new(Queue::bounded(config.queue_capacity));
        handles.push(MuxOutputSmoother::new(muxed, paced.clone(), clock.clone(), DEFAULT_TEMPORAL_VBV_27MHZ, drop_flag.clone()).spawn());

        let mut output_queues = Vec::new();
        let mut output_statuses = Vec::new();
        for descriptor in &config.outputs {
            let queue: Arc<Queue<BufRef>> = Arc::new(Queue::bounded(config.queue_capacity));
            let status = Arc::new(OutputStatus::default());
            let worker = OutputWorker::new(queue.clone(), descriptor.clone(), status.clone(), clock.clone()).map_err(|e| EngineError::OutputOpenFailed { host: descriptor.host.clone(), port: descriptor.port, source: e })?;
            handles.extend(worker.spawn());
            output_queues.push(queue);
            output_statuses.push(status);
        }

        handles.push(spawn_fanout(paced, output_queues.clone()));

        let status = Arc::new(EngineStatus::new(input_status.clone(), encoder_status, output_statuses, config.video_format.clone()));

        let sink = InputSink { clock, stream_queues: stream_queues.clone(), status: input_status, drop_flag: drop_flag.clone() };
        let input_handle = thread::Builder::new()
            .name("obe-input".into())
            .spawn(move || input.open(sink))
            .expect("failed to spawn input adapter thread");

        Ok(Engine { drop_flag, stream_queues, output_queues, muxrate_update, status, handles, input_handle: Some(input_handle) })
    }

    /// Requests a live muxrate change (spec.md §4.6); the multiplexer
    /// thread applies it on its next loop iteration.
    pub fn update_bitrate(&self, muxrate_bps: u32) {
        self.muxrate_update.request(muxrate_bps);
    }

    pub fn status(&self) -> Arc<EngineStatus> {
        self.status.clone()
    }

    /// Signals a discontinuity without tearing the pipeline down — the
    /// same re-anchor path the input adapter drives on signal loss
    /// (spec.md §4.9).
    pub fn signal_discontinuity(&self) {
        self.drop_flag.store(true, std::sync::atomic::Ordering::Release);
    }

    /// Cancels every internal queue from the input side outward (spec.md
    /// §5: "no timeout semantics on internal queues" — shutdown is
    /// cooperative cancellation, not a forced kill) and joins all worker
    /// threads.
    pub fn stop(mut self) {
        for queue in &self.stream_queues {
            queue.cancel();
        }
        if let Some(handle) = self.input_handle.take() {
            let _ = handle.join();
        }
        for queue in &self.output_queues {
            queue.cancel();
        }
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

fn spawn_audio_encoder(
    format: StreamFormat,
    params: AudioCodecParams,
    sample_rate: u32,
    output_stream_id: u32,
    input: Arc<Queue<RawFrame>>,
    output: Arc<Queue<CodedFrame>>,
    handles: &mut Vec<JoinHandle<()>>,
) -> Result<(), EngineError> {
    use obe_encode::audio::{CompressedAudioFormat, FfmpegAudioEncoder, S302mEncoder};

    match format {
        StreamFormat::AudioS302m => {
            let encoder = S302mEncoder::new(sample_rate, params.s302m_bit_depth, params.s302m_pairs);
            handles.push(AudioEncoderWorker::new(output_stream_id, input, output, encoder).spawn());
        }
        StreamFormat::AudioMp2 | StreamFormat::AudioAc3 | StreamFormat::AudioAac => {
            let compressed = match format {
                StreamFormat::AudioMp2 => CompressedAudioFormat::Mp2,
                StreamFormat::AudioAc3 => CompressedAudioFormat::Ac3,
                _ => CompressedAudioFormat::Aac,
            };
            let encoder = FfmpegAudioEncoder::open(compressed, sample_rate, 2, &params)?;
            handles.push(AudioEncoderWorker::new(output_stream_id, input, output, encoder).spawn());
        }
        _ => {}
    }
    Ok(())
}

/// Clones each muxed `buf_ref` to every configured output's queue
/// (spec.md §5: "the same `buf_ref` sequence is delivered to every
/// output"). `BufRef::clone` is a refcount bump, not a copy.
fn spawn_fanout(input: Arc<Queue<BufRef>>, outputs: Vec<Arc<Queue<BufRef>>>) -> JoinHandle<()> {
    thread::Builder::new()
        .name("obe-fanout".into())
        .spawn(move || loop {
            let buf_ref = match input.pop() {
                Some(b) => b,
                None => {
                    log::info!("obe-engine: fan-out input cancelled, exiting");
                    for queue in &outputs {
                        queue.cancel();
                    }
                    return;
                }
            };
            for queue in &outputs {
                queue.push(buf_ref.clone());
            }
        })
        .expect("failed to spawn fan-out thread")
}
