//! Drives the whole pipeline end to end with the synthetic black-frame
//! input adapter, standing in for the excluded capture drivers (spec.md
//! §1). Encodes a short run of 1080i25 video and 48 kHz stereo audio to
//! H.264 + MP2 and sends the resulting transport stream to a single UDP
//! output, then reports a final status snapshot.

use std::time::Duration;

use obe_core::descriptor::{AudioCodecParams, OutputDescriptor, StreamDescriptor, StreamFormat, VideoCodecParams};
use obe_engine::{Engine, EngineConfig, SyntheticInput, VideoFormat};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let video_format = VideoFormat { width: 1920, height: 1080, frame_rate_num: 25, frame_rate_den: 1, interlaced: true };

    let config = EngineConfig {
        video_format: video_format.clone(),
        audio_sample_rate: 48_000,
        program_number: 1,
        pmt_pid: 0x1000,
        pcr_pid: 0x100,
        muxrate_bps: 8_000_000,
        streams: vec![
            StreamDescriptor::video(0x100, VideoCodecParams { bitrate_kbit: 5000, vbv_max_bitrate_kbit: 5000, vbv_buffer_size_kbit: 5000, ..VideoCodecParams::default() }),
            StreamDescriptor::audio(0x101, StreamFormat::AudioMp2, AudioCodecParams { bitrate_kbit: 192, ..AudioCodecParams::default() }),
        ],
        outputs: vec![OutputDescriptor { host: "239.1.1.1".to_string(), port: 5500, ..OutputDescriptor::default() }],
        queue_capacity: 64,
    };

    let input = Box::new(SyntheticInput::new(
        video_format.width,
        video_format.height,
        video_format.frame_rate_num,
        video_format.frame_rate_den,
        48_000,
        2,
        250,
    ));

    let engine = Engine::start(config, input).map_err(|e| anyhow::anyhow!("failed to start engine: {e}"))?;

    std::thread::sleep(Duration::from_secs(2));
    let snapshot = engine.status().snapshot();
    log::info!(
        "obe-demo: input_active={} encoder_ready={} outputs={}",
        snapshot.input_active,
        snapshot.encoder_ready,
        snapshot.outputs.len()
    );
    for (idx, output) in snapshot.outputs.iter().enumerate() {
        log::info!("obe-demo: output[{idx}] pkt_cnt={} octet_cnt={}", output.pkt_cnt, output.octet_cnt);
    }

    engine.stop();
    Ok(())
}
