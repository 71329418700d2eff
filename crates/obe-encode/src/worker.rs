//! Encoder worker threads (spec.md §4.4): one per video output, consuming
//! filtered `RawFrame`s and producing `CodedFrame`s toward the
//! encoder-output smoother (video) or straight to the mux queue (audio).

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use obe_core::clock::OBE_CLOCK;
use obe_core::coded::CodedFrame;
use obe_core::frame::RawFrame;
use obe_core::queue::Queue;
use obe_core::status::EncoderStatus;

use crate::codec::{AudioEncoder, VideoEncoder};

fn round_to_27mhz(seconds: f64) -> i64 {
    (seconds * OBE_CLOCK as f64).round() as i64
}

/// One video encoder worker (spec.md §4.4 steps 1-5).
pub struct VideoEncoderWorker<E: VideoEncoder> {
    output_stream_id: u32,
    input: Arc<Queue<RawFrame>>,
    output: Arc<Queue<CodedFrame>>,
    encoder: E,
    status: Arc<EncoderStatus>,
}

impl<E: VideoEncoder + 'static> VideoEncoderWorker<E> {
    pub fn new(output_stream_id: u32, input: Arc<Queue<RawFrame>>, output: Arc<Queue<CodedFrame>>, encoder: E, status: Arc<EncoderStatus>) -> Self {
        VideoEncoderWorker { output_stream_id, input, output, encoder, status }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        thread::Builder::new()
            .name(format!("obe-venc-{}", self.output_stream_id))
            .spawn(move || self.run())
            .expect("failed to spawn video encoder thread")
    }

    fn run(mut self) {
        loop {
            let frame = match self.input.pop() {
                Some(f) => f,
                None => {
                    log::info!("obe-encode: video stream {} input cancelled, exiting", self.output_stream_id);
                    self.output.cancel();
                    return;
                }
            };
            let pic = match frame.as_picture() {
                Some(p) => p,
                None => {
                    log::warn!("obe-encode: video stream {} received non-picture frame", self.output_stream_id);
                    continue;
                }
            };

            let units = match self.encoder.encode(pic, frame.pts) {
                Ok(units) => units,
                Err(e) => {
                    log::error!("obe-encode: video stream {} codec rejected frame: {e}", self.output_stream_id);
                    continue;
                }
            };

            if let Some(vbv) = self.encoder.vbv_params() {
                if !self.status.is_ready() {
                    self.status.mark_ready(
                        (vbv.vbv_buffer_size_kbit as i64) * OBE_CLOCK / 1000,
                        (vbv.vbv_init_fill_kbit as i64) * OBE_CLOCK / 1000,
                    );
                }
            }

            for unit in units {
                let coded = CodedFrame {
                    output_stream_id: self.output_stream_id,
                    is_video: true,
                    pts: frame.pts,
                    real_pts: round_to_27mhz(unit.hrd.dpb_output_time_s),
                    real_dts: round_to_27mhz(unit.hrd.cpb_removal_time_s),
                    cpb_initial_arrival_time: round_to_27mhz(unit.hrd.cpb_initial_arrival_time_s),
                    cpb_final_arrival_time: round_to_27mhz(unit.hrd.cpb_final_arrival_time_s),
                    random_access: unit.random_access,
                    priority: unit.priority,
                    duration: 0,
                    data: unit.data,
                    scte35_opaque: None,
                };
                if !coded.video_invariants_hold() {
                    log::error!(
                        "obe-encode: video stream {} produced a coded frame violating HRD invariants (dts={} pts={})",
                        self.output_stream_id, coded.real_dts, coded.real_pts
                    );
                }
                if !self.output.push(coded) {
                    log::warn!("obe-encode: video stream {} output queue cancelled", self.output_stream_id);
                    return;
                }
            }
        }
    }
}

/// Shared audio encoder worker skeleton (spec.md §4.4): consumes PCM from
/// the per-encoder queue, maintains a local FIFO of planar samples,
/// drains in `codec.frame_size` chunks (or forwards whole blocks when
/// `frame_size()` is zero — the S302M passthrough case), encodes,
/// synthesizes PTS by sample-count progression.
pub struct AudioEncoderWorker<E: AudioEncoder> {
    output_stream_id: u32,
    input: Arc<Queue<RawFrame>>,
    output: Arc<Queue<CodedFrame>>,
    encoder: E,
    fifo: Vec<Vec<i32>>,
    cur_pts: Option<i64>,
}

impl<E: AudioEncoder + 'static> AudioEncoderWorker<E> {
    pub fn new(output_stream_id: u32, input: Arc<Queue<RawFrame>>, output: Arc<Queue<CodedFrame>>, encoder: E) -> Self {
        AudioEncoderWorker { output_stream_id, input, output, encoder, fifo: Vec::new(), cur_pts: None }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        thread::Builder::new()
            .name(format!("obe-aenc-{}", self.output_stream_id))
            .spawn(move || self.run())
            .expect("failed to spawn audio encoder thread")
    }

    fn run(mut self) {
        loop {
            let frame = match self.input.pop() {
                Some(f) => f,
                None => {
                    log::info!("obe-encode: audio stream {} input cancelled, exiting", self.output_stream_id);
                    self.output.cancel();
                    return;
                }
            };
            let audio = match frame.as_audio() {
                Some(a) => a,
                None => continue,
            };
            if self.cur_pts.is_none() {
                self.cur_pts = Some(frame.pts);
            }

            if self.fifo.len() != audio.num_channels as usize {
                self.fifo = vec![Vec::new(); audio.num_channels as usize];
            }
            for (ch, samples) in audio.audio_data.iter().enumerate() {
                self.fifo[ch].extend_from_slice(samples);
            }

            let frame_size = self.encoder.frame_size() as usize;
            let chunk_size = if frame_size == 0 { self.fifo.first().map(|c| c.len()).unwrap_or(0) } else { frame_size };
            if chunk_size == 0 {
                continue;
            }

            while self.fifo.first().map(|c| c.len()).unwrap_or(0) >= chunk_size {
                let chunk = obe_core::frame::AudioBlock {
                    sample_fmt: audio.sample_fmt,
                    num_channels: audio.num_channels,
                    num_samples: chunk_size as u32,
                    audio_data: self.fifo.iter_mut().map(|ch| ch.drain(..chunk_size).collect()).collect(),
                };

                let payloads = match self.encoder.encode(&chunk) {
                    Ok(p) => p,
                    Err(e) => {
                        log::error!("obe-encode: audio stream {} codec rejected frame: {e}", self.output_stream_id);
                        continue;
                    }
                };

                let pts = *self.cur_pts.get_or_insert(frame.pts);
                let duration = (chunk_size as i64 * OBE_CLOCK) / self.encoder.sample_rate().max(1) as i64;

                for data in payloads {
                    let coded = CodedFrame {
                        output_stream_id: self.output_stream_id,
                        is_video: false,
                        pts,
                        real_pts: pts,
                        real_dts: pts,
                        cpb_initial_arrival_time: pts,
                        cpb_final_arrival_time: pts,
                        random_access: true,
                        priority: false,
                        duration,
                        data,
                        scte35_opaque: None,
                    };
                    if !self.output.push(coded) {
                        log::warn!("obe-encode: audio stream {} output queue cancelled", self.output_stream_id);
                        return;
                    }
                }
                self.cur_pts = Some(pts + duration);
            }
        }
    }
}
