//! The video codec wrapper (spec.md §4.4): opens an x264-equivalent
//! encoder — here, libx264 through `ffmpeg-the-third`'s `AVCodecContext`
//! binding, the same crate and `encoder::video().open_as_with(..,
//! Dictionary)` pattern the teacher's `run_encode` already uses for its
//! H.264 stream — and turns each emitted packet into an `EncodedVideoUnit`
//! with HRD timing from `crate::hrd::Hrd`.

use ffmpeg_the_third as ffmpeg;
use ffmpeg::codec::{self, Id as CodecId};
use ffmpeg::encoder;
use ffmpeg::format::Pixel;
use ffmpeg::util::frame::video::Video as FfVideoFrame;
use ffmpeg::util::rational::Rational;

use obe_core::descriptor::VideoCodecParams;
use obe_core::frame::{Picture, PixelFormat};

use crate::codec::{EncodedVideoUnit, HrdTiming, VbvParams, VideoEncoder};
use crate::error::EncodeError;
use crate::hrd::Hrd;

/// Maps our `PixelFormat` onto the FFmpeg `Pixel` the x264 wrapper opens
/// with. 10-bit formats need `x264_10bit`-family profiles that
/// `ffmpeg-the-third`'s safe API doesn't special-case beyond the pixel
/// format itself, so this is a straight lookup.
fn ffmpeg_pixel_format(fmt: PixelFormat) -> Pixel {
    match fmt {
        PixelFormat::Yuv420P8 => Pixel::YUV420P,
        PixelFormat::Yuv420P10 => Pixel::YUV420P10LE,
        PixelFormat::Yuv422P10 => Pixel::YUV422P10LE,
        PixelFormat::Yuv444P10 => Pixel::YUV444P10LE,
    }
}

/// x264 wrapper satisfying the `VideoEncoder` contract (spec.md §6).
pub struct X264Encoder {
    encoder: encoder::video::Video,
    hrd: Hrd,
    vbv: Option<VbvParams>,
    frame_rate: (u32, u32),
}

impl X264Encoder {
    pub fn open(width: u32, height: u32, format: PixelFormat, frame_rate_num: u32, frame_rate_den: u32, params: &VideoCodecParams) -> Result<Self, EncodeError> {
        let h264 = encoder::find(CodecId::H264)
            .ok_or_else(|| EncodeError::OpenFailed("H.264 encoder not found — is libx264 available?".into()))?;

        let ctx = codec::context::Context::new_with_codec(h264);
        let mut video_enc = ctx
            .encoder()
            .video()
            .map_err(|e| EncodeError::OpenFailed(format!("create video encoder context: {e}")))?;

        let time_base = Rational::new(frame_rate_den as i32, frame_rate_num as i32);
        video_enc.set_width(width);
        video_enc.set_height(height);
        video_enc.set_format(ffmpeg_pixel_format(format));
        video_enc.set_time_base(time_base);
        video_enc.set_frame_rate(Some(Rational::new(frame_rate_num as i32, frame_rate_den as i32)));
        video_enc.set_bit_rate((params.bitrate_kbit as usize) * 1000);
        video_enc.set_max_bit_rate((params.vbv_max_bitrate_kbit as usize) * 1000);

        let mut opts = ffmpeg::Dictionary::new();
        opts.set("preset", "faster");
        opts.set("profile", &params.profile);
        opts.set("vbv-maxrate", &params.vbv_max_bitrate_kbit.to_string());
        opts.set("vbv-bufsize", &params.vbv_buffer_size_kbit.to_string());
        opts.set("keyint", &params.keyint_max.to_string());
        opts.set("bframes", &params.bframes.to_string());
        opts.set("threads", &params.threads.to_string());
        if params.intra_refresh {
            opts.set("intra-refresh", "1");
        }

        let encoder = video_enc
            .open_as_with(h264, opts)
            .map_err(|e| EncodeError::OpenFailed(format!("open H.264 encoder: {e}")))?;

        let vbv = VbvParams {
            vbv_buffer_size_kbit: params.vbv_buffer_size_kbit,
            vbv_init_fill_kbit: params.vbv_buffer_size_kbit / 2,
        };
        let hrd = Hrd::new(params.bitrate_kbit, params.vbv_buffer_size_kbit, frame_rate_num, frame_rate_den);

        Ok(X264Encoder {
            encoder,
            hrd,
            vbv: Some(vbv),
            frame_rate: (frame_rate_num, frame_rate_den),
        })
    }

    fn to_ffmpeg_frame(pic: &Picture) -> FfVideoFrame {
        let fmt = ffmpeg_pixel_format(pic.format);
        let mut frame = FfVideoFrame::new(fmt, pic.width, pic.height);
        for plane_idx in 0..3usize {
            let src = &pic.plane[plane_idx];
            if src.is_empty() {
                continue;
            }
            let is_8bit = matches!(pic.format, PixelFormat::Yuv420P8);
            let stride = frame.stride(plane_idx);
            let dst = frame.data_mut(plane_idx);
            let row_samples = if plane_idx == 0 {
                pic.width as usize
            } else {
                (pic.width as usize) / if pic.format == PixelFormat::Yuv444P10 { 1 } else { 2 }
            };
            let rows = src.len() / row_samples.max(1);
            for row in 0..rows {
                let src_row = &src[row * row_samples..row * row_samples + row_samples];
                if is_8bit {
                    for (i, &s) in src_row.iter().enumerate() {
                        dst[row * stride + i] = s as u8;
                    }
                } else {
                    for (i, &s) in src_row.iter().enumerate() {
                        let bytes = s.to_le_bytes();
                        dst[row * stride + i * 2] = bytes[0];
                        dst[row * stride + i * 2 + 1] = bytes[1];
                    }
                }
            }
        }
        frame
    }
}

impl VideoEncoder for X264Encoder {
    fn encode(&mut self, pic: &Picture, _input_pts: i64) -> Result<Vec<EncodedVideoUnit>, EncodeError> {
        let frame = Self::to_ffmpeg_frame(pic);
        self.encoder
            .send_frame(&frame)
            .map_err(|e| EncodeError::FrameRejected(format!("x264 send_frame: {e}")))?;

        let mut units = Vec::new();
        let mut pkt = ffmpeg::Packet::empty();
        while self.encoder.receive_packet(&mut pkt).is_ok() {
            let data = pkt.data().map(|d| bytes::Bytes::copy_from_slice(d)).unwrap_or_default();
            let sample = self.hrd.feed(data.len());
            let random_access = pkt.is_key();
            units.push(EncodedVideoUnit {
                data,
                hrd: HrdTiming {
                    cpb_removal_time_s: sample.cpb_removal_time_s,
                    dpb_output_time_s: sample.dpb_output_time_s,
                    cpb_initial_arrival_time_s: sample.cpb_initial_arrival_time_s,
                    cpb_final_arrival_time_s: sample.cpb_final_arrival_time_s,
                },
                random_access,
                priority: random_access,
            });
        }
        Ok(units)
    }

    fn vbv_params(&self) -> Option<VbvParams> {
        self.vbv
    }

    fn update_stream(&mut self, params: &VideoCodecParams) -> Result<(), EncodeError> {
        // x264 supports a live reconfigure of rate-control parameters via
        // `x264_encoder_reconfig`; `ffmpeg-the-third`'s safe wrapper does
        // not expose that call, so a bitrate change here is modeled by
        // re-deriving the HRD simulation the worker uses to timestamp
        // subsequent frames (the actual bitstream-level reconfiguration
        // would need unsafe FFI directly into the AVCodecContext, out of
        // scope for this crate per spec.md §1's "codec kernels" Non-goal).
        self.hrd = Hrd::new(params.bitrate_kbit, params.vbv_buffer_size_kbit, self.frame_rate.0, self.frame_rate.1);
        self.vbv = Some(VbvParams {
            vbv_buffer_size_kbit: params.vbv_buffer_size_kbit,
            vbv_init_fill_kbit: params.vbv_buffer_size_kbit / 2,
        });
        Ok(())
    }
}
