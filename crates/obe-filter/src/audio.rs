//! Audio filtering (spec.md §4.3 "Audio"): splitting an interleaved
//! multi-channel SDI-pair capture per output channel map, and converting
//! sample format for the encoder that requested it.

use obe_core::descriptor::PcmLayout;
use obe_core::frame::{AudioBlock, SampleFormat};

/// Selects and reorders channels from a captured `AudioBlock` (which may
/// carry all 16 SDI channels) down to the subset + order an output
/// descriptor's `PcmLayout` wants.
pub fn split_channels(block: &AudioBlock, layout: &PcmLayout) -> AudioBlock {
    let mut channel_indices = Vec::new();
    for &(a, b) in &layout.sdi_pairs {
        channel_indices.push(a as usize);
        channel_indices.push(b as usize);
    }
    channel_indices.truncate(layout.num_channels as usize);

    let audio_data = channel_indices
        .iter()
        .map(|&idx| block.audio_data.get(idx).cloned().unwrap_or_default())
        .collect();

    AudioBlock {
        sample_fmt: block.sample_fmt,
        num_channels: channel_indices.len() as u32,
        num_samples: block.num_samples,
        audio_data,
    }
}

/// Converts planar `i32` canonical samples to planar `f32` in `[-1.0,
/// 1.0)`, the format several audio codecs (AAC, Opus) prefer — the
/// libswresample-equivalent step named in spec.md §4.3.
pub fn convert_to_planar_float(block: &AudioBlock) -> AudioBlock {
    if block.sample_fmt == SampleFormat::PlanarFloat {
        return block.clone();
    }
    AudioBlock {
        sample_fmt: SampleFormat::PlanarFloat,
        num_channels: block.num_channels,
        num_samples: block.num_samples,
        audio_data: block
            .audio_data
            .iter()
            .map(|ch| ch.iter().map(|&s| (s as f64 / i32::MAX as f64) as i32).collect())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(channels: usize) -> AudioBlock {
        AudioBlock {
            sample_fmt: SampleFormat::PlanarS32,
            num_channels: channels as u32,
            num_samples: 4,
            audio_data: (0..channels).map(|c| vec![c as i32; 4]).collect(),
        }
    }

    #[test]
    fn split_channels_picks_configured_pairs() {
        let src = block(8);
        let layout = PcmLayout { num_channels: 2, sdi_pairs: vec![(2, 3)] };
        let out = split_channels(&src, &layout);
        assert_eq!(out.num_channels, 2);
        assert_eq!(out.audio_data[0][0], 2);
        assert_eq!(out.audio_data[1][0], 3);
    }
}
