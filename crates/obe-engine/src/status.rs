//! `EngineStatus` (spec.md §7): "a status object exposing
//! `{input_active, detected_video_format, per_output ARQ depth}`, polled
//! rather than pushed." Aggregates the per-component status types each
//! stage crate owns independently.

use std::sync::Arc;

use obe_core::status::{EncoderStatus, InputStatus, OutputStatus};

use crate::config::VideoFormat;

/// One output's polled counters (spec.md §7, SPEC_FULL.md §B.3).
#[derive(Debug, Clone, Copy)]
pub struct OutputStatusSnapshot {
    pub pkt_cnt: u64,
    pub octet_cnt: u64,
    pub arq_depth: u64,
    pub arq_retransmits: u64,
}

/// The full polled status surface (spec.md §7).
#[derive(Debug, Clone)]
pub struct EngineStatusSnapshot {
    pub input_active: bool,
    pub detected_video_format: VideoFormat,
    pub encoder_ready: bool,
    pub outputs: Vec<OutputStatusSnapshot>,
}

/// Holds the `Arc`s every worker thread reports into; `snapshot()` reads
/// them without touching the threads themselves (spec.md §7: "polled
/// rather than pushed").
pub struct EngineStatus {
    input: Arc<InputStatus>,
    encoder: Arc<EncoderStatus>,
    outputs: Vec<Arc<OutputStatus>>,
    video_format: VideoFormat,
}

impl EngineStatus {
    pub fn new(input: Arc<InputStatus>, encoder: Arc<EncoderStatus>, outputs: Vec<Arc<OutputStatus>>, video_format: VideoFormat) -> Self {
        EngineStatus { input, encoder, outputs, video_format }
    }

    pub fn snapshot(&self) -> EngineStatusSnapshot {
        EngineStatusSnapshot {
            input_active: self.input.is_active(),
            detected_video_format: self.video_format.clone(),
            encoder_ready: self.encoder.is_ready(),
            outputs: self
                .outputs
                .iter()
                .map(|o| OutputStatusSnapshot {
                    pkt_cnt: o.pkt_cnt.load(std::sync::atomic::Ordering::Relaxed),
                    octet_cnt: o.octet_cnt.load(std::sync::atomic::Ordering::Relaxed),
                    arq_depth: o.arq_depth.load(std::sync::atomic::Ordering::Relaxed),
                    arq_retransmits: o.arq_retransmits.load(std::sync::atomic::Ordering::Relaxed),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_component_state() {
        let input = Arc::new(InputStatus::default());
        input.note_frame(1000);
        let encoder = Arc::new(EncoderStatus::default());
        encoder.mark_ready(1000, 500);
        let output = Arc::new(OutputStatus::default());
        output.note_sent(1316);

        let status = EngineStatus::new(input, encoder, vec![output], VideoFormat::default());
        let snap = status.snapshot();
        assert!(snap.input_active);
        assert!(snap.encoder_ready);
        assert_eq!(snap.outputs[0].pkt_cnt, 1);
        assert_eq!(snap.outputs[0].octet_cnt, 1316);
    }
}
