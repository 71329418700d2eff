//! `raw_frame` (spec.md §3): the uniformly-typed carrier for a picture, an
//! audio block, or ancillary data as it moves input → filter → encoder.
//!
//! The source models ownership with two opaque callbacks, `release_data`
//! and `release_frame`; spec.md §9 calls that out as an artifact to
//! re-architect ("the destructor is a tag, not a function pointer"). Here
//! the backing buffers are plain `bytes::Bytes`/`Vec` fields owned by the
//! `RawFrame` value itself — dropping the value releases everything, so
//! there is no separate release step to forget. A queue hands a `RawFrame`
//! to exactly one consumer at a time (the "owned by exactly one queue"
//! invariant), enforced by Rust's move semantics rather than a runtime
//! check.

use crate::timecode::Timecode;
use serde::{Deserialize, Serialize};

/// Recognized planar video formats (spec.md §3 `format`). The input
/// adapter's contract (spec.md §6) only ever delivers 4:2:2 10-bit, but
/// filter-stage conversion produces the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    Yuv422P10,
    Yuv420P8,
    Yuv420P10,
    Yuv444P10,
}

/// Canonical planar audio sample format (spec.md §3: "planar int32
/// canonical").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleFormat {
    PlanarS32,
    PlanarFloat,
}

/// A single item of `user_data[]`: captions, AFD, bar data, or timecode
/// riding alongside a picture for the filter stage to encapsulate
/// (spec.md §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum UserData {
    Cea608 { field: u8, data: Vec<u8> },
    Cea708Cdp { data: Vec<u8> },
    Afd { afd: u8, is_wide: bool },
    BarData { top: u16, bottom: u16, left: u16, right: u16 },
    VbiLine { line: u32, field: u8, data: Vec<u8> },
}

/// Picture-specific fields of a `raw_frame` (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Picture {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    /// Bytes per row, one per plane; zero for planes the format doesn't use.
    pub stride: [u32; 3],
    /// Plane payloads in raster order, one `Vec<u16>` per plane (16-bit
    /// samples whether the underlying format is 8 or 10 bit — the filter
    /// stage upshifts as described in spec.md §4.3).
    pub plane: [Vec<u16>; 3],
    pub sar_num: u32,
    pub sar_den: u32,
    pub first_line: u32,
    pub interlaced: bool,
    pub tff: bool,
    pub timebase_num: u32,
    pub timebase_den: u32,
    pub valid_timecode: bool,
    pub timecode: Timecode,
}

impl Picture {
    pub fn blank(width: u32, height: u32, format: PixelFormat) -> Self {
        let luma = (width * height) as usize;
        let chroma = luma / 2;
        Picture {
            format,
            width,
            height,
            stride: [width * 2, width, width],
            plane: [vec![0u16; luma], vec![0u16; chroma], vec![0u16; chroma]],
            sar_num: 1,
            sar_den: 1,
            first_line: 0,
            interlaced: false,
            tff: true,
            timebase_num: 1,
            timebase_den: 25,
            valid_timecode: false,
            timecode: Timecode::default(),
        }
    }
}

/// Audio-specific fields of a `raw_frame` (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioBlock {
    pub sample_fmt: SampleFormat,
    pub num_channels: u32,
    pub num_samples: u32,
    /// One `Vec<i32>` of `num_samples` entries per channel.
    pub audio_data: Vec<Vec<i32>>,
}

/// Ancillary-only payload (spec.md §3 "Ancillary fields").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ancillary {
    pub data: Vec<u8>,
}

/// The frame's carried payload, discriminated by kind (spec.md §3: picture,
/// audio block, or ancillary data; "a uniformly-typed carrier").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FramePayload {
    Picture(Picture),
    Audio(AudioBlock),
    Ancillary(Ancillary),
}

/// The common carrier that flows between every stage up to the encoders
/// (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFrame {
    pub input_stream_id: u32,
    /// 27 MHz `OBE_CLOCK` ticks, strictly monotonic within one input stream.
    pub pts: i64,
    /// Set only on audio frames whose muxing is gated by a picture
    /// (spec.md §3): the video PTS/duration the audio frame rides with.
    pub video_pts: Option<i64>,
    pub video_duration: Option<i64>,
    pub user_data: Vec<UserData>,
    pub payload: FramePayload,
}

impl RawFrame {
    pub fn picture(input_stream_id: u32, pts: i64, picture: Picture) -> Self {
        RawFrame {
            input_stream_id,
            pts,
            video_pts: None,
            video_duration: None,
            user_data: Vec::new(),
            payload: FramePayload::Picture(picture),
        }
    }

    pub fn audio(input_stream_id: u32, pts: i64, audio: AudioBlock) -> Self {
        RawFrame {
            input_stream_id,
            pts,
            video_pts: None,
            video_duration: None,
            user_data: Vec::new(),
            payload: FramePayload::Audio(audio),
        }
    }

    pub fn ancillary(input_stream_id: u32, pts: i64, data: Vec<u8>) -> Self {
        RawFrame {
            input_stream_id,
            pts,
            video_pts: None,
            video_duration: None,
            user_data: Vec::new(),
            payload: FramePayload::Ancillary(Ancillary { data }),
        }
    }

    pub fn as_picture(&self) -> Option<&Picture> {
        match &self.payload {
            FramePayload::Picture(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_audio(&self) -> Option<&AudioBlock> {
        match &self.payload {
            FramePayload::Audio(a) => Some(a),
            _ => None,
        }
    }
}
