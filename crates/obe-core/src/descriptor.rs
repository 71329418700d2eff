//! Configuration descriptors (spec.md §3): stream descriptors and output
//! descriptors. These are pure data, deserializable from the structured
//! JSON descriptors spec.md §6 calls "Configured state: none persistent;
//! all configuration supplied at start via structured descriptors."

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamType {
    Video,
    Audio,
    Subtitle,
    Misc,
}

/// Codec tag a stream is configured for (spec.md §3 `stream_format`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamFormat {
    VideoAvc,
    AudioMp2,
    AudioAc3,
    AudioAac,
    AudioS302m,
    DvbVbi,
    DvbTeletext,
    DvbSubtitle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AacProfile {
    Lc,
    HeAacV1,
    HeAacV2,
}

/// x264-equivalent parameters passed once at open and optionally patched
/// at runtime (spec.md §6 "Codec-library contract").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoCodecParams {
    pub vbv_max_bitrate_kbit: u32,
    pub vbv_buffer_size_kbit: u32,
    pub bitrate_kbit: u32,
    pub keyint_max: u32,
    pub lookahead: u32,
    pub bframes: u32,
    pub threads: u32,
    pub profile: String,
    pub intra_refresh: bool,
}

impl Default for VideoCodecParams {
    fn default() -> Self {
        VideoCodecParams {
            vbv_max_bitrate_kbit: 6000,
            vbv_buffer_size_kbit: 6000,
            bitrate_kbit: 6000,
            keyint_max: 50,
            lookahead: 20,
            bframes: 3,
            threads: 4,
            profile: "high".to_string(),
            intra_refresh: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioCodecParams {
    pub bitrate_kbit: u32,
    pub aac_profile: AacProfile,
    pub latm_output: bool,
    /// SMPTE 302M bit depth (16/20/24) and number of channel pairs.
    pub s302m_bit_depth: u32,
    pub s302m_pairs: u32,
}

impl Default for AudioCodecParams {
    fn default() -> Self {
        AudioCodecParams {
            bitrate_kbit: 192,
            aac_profile: AacProfile::Lc,
            latm_output: false,
            s302m_bit_depth: 24,
            s302m_pairs: 1,
        }
    }
}

/// PCM channel layout & SDI pair mapping (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PcmLayout {
    pub num_channels: u32,
    pub sdi_pairs: Vec<(u32, u32)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub stream_type: StreamType,
    pub stream_format: StreamFormat,
    pub output_pid: u16,
    pub video_params: Option<VideoCodecParams>,
    pub audio_params: Option<AudioCodecParams>,
    pub pcm_layout: Option<PcmLayout>,
    pub language: String,
    pub teletext_pages: Vec<u16>,
    pub vbi_lines: Vec<u32>,
    pub scte35_tcp_source: Option<String>,
}

impl StreamDescriptor {
    pub fn video(output_pid: u16, params: VideoCodecParams) -> Self {
        StreamDescriptor {
            stream_type: StreamType::Video,
            stream_format: StreamFormat::VideoAvc,
            output_pid,
            video_params: Some(params),
            audio_params: None,
            pcm_layout: None,
            language: "eng".to_string(),
            teletext_pages: Vec::new(),
            vbi_lines: Vec::new(),
            scte35_tcp_source: None,
        }
    }

    pub fn audio(output_pid: u16, format: StreamFormat, params: AudioCodecParams) -> Self {
        StreamDescriptor {
            stream_type: StreamType::Audio,
            stream_format: format,
            output_pid,
            video_params: None,
            audio_params: Some(params),
            pcm_layout: None,
            language: "eng".to_string(),
            teletext_pages: Vec::new(),
            vbi_lines: Vec::new(),
            scte35_tcp_source: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputType {
    Udp,
    Rtp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FecType {
    None,
    Cop3BlockAligned,
    Cop3NonBlockAligned,
    FecframeLdpcStaircase,
}

/// Destination URI fields (spec.md §3, §6 "Output URI grammar":
/// `udp://HOST:PORT[?ttl=N&tos=N&localport=N&iface=NAME&buffer_size=N&reuse=1]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputDescriptor {
    pub output_type: OutputType,
    pub host: String,
    pub port: u16,
    pub ttl: u32,
    pub tos: u8,
    pub local_port: Option<u16>,
    pub interface: Option<String>,
    pub buffer_size: Option<usize>,
    pub reuse: bool,
    pub fec_type: FecType,
    pub fec_columns: u32,
    pub fec_rows: u32,
    pub dup_delay_us: u64,
    pub arq_latency_ms: u64,
}

impl Default for OutputDescriptor {
    fn default() -> Self {
        OutputDescriptor {
            output_type: OutputType::Udp,
            host: "239.0.0.1".to_string(),
            port: 5000,
            ttl: 16,
            tos: 0,
            local_port: None,
            interface: None,
            buffer_size: None,
            reuse: false,
            fec_type: FecType::None,
            fec_columns: 0,
            fec_rows: 0,
            dup_delay_us: 0,
            arq_latency_ms: 0,
        }
    }
}
