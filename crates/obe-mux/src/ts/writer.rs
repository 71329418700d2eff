//! The MPEG-TS library contract (spec.md §6): "takes `(frame[], count)`
//! with PID, PTS/DTS in 90 kHz, CPB times, random-access flag, priority,
//! and returns `(bytes, length, pcr_list)`." `TsWriter` is the
//! self-contained equivalent this workspace provides, since the real
//! libmpegts the source calls into is external (spec.md §1).

use std::collections::HashMap;

use bytes::{BufMut, Bytes, BytesMut};

use obe_core::clock::OBE_CLOCK;
use obe_core::coded::CodedFrame;
use obe_core::descriptor::StreamFormat;
use obe_core::muxed::MuxedData;

use super::header::{AdaptationField, TsHeader, TS_PACKET_SIZE};
use super::pes::{build_pes, STREAM_ID_AUDIO, STREAM_ID_PRIVATE, STREAM_ID_VIDEO};
use super::psi::{build_pat, build_pmt, stream_type_for, PmtStreamEntry, PID_PAT};

/// Default PAT/PMT repetition interval (spec.md §8 scenario S1: "exactly
/// one PAT/PMT pair every 100 ms +-10 ms").
pub const DEFAULT_PAT_PERIOD_27MHZ: i64 = OBE_CLOCK / 10;

pub struct TsStreamConfig {
    pub output_stream_id: u32,
    pub pid: u16,
    pub format: StreamFormat,
}

pub struct TsWriterConfig {
    pub program_number: u16,
    pub pmt_pid: u16,
    pub pcr_pid: u16,
    pub pat_period_27mhz: i64,
    pub muxrate_bps: u32,
    pub streams: Vec<TsStreamConfig>,
}

impl TsWriterConfig {
    pub fn new(program_number: u16, pmt_pid: u16, pcr_pid: u16, muxrate_bps: u32, streams: Vec<TsStreamConfig>) -> Self {
        TsWriterConfig { program_number, pmt_pid, pcr_pid, pat_period_27mhz: DEFAULT_PAT_PERIOD_27MHZ, muxrate_bps, streams }
    }
}

/// Stateful TS multiplexer: holds continuity counters and the PAT/PMT
/// repetition schedule across calls to `write`.
pub struct TsWriter {
    config: TsWriterConfig,
    continuity: HashMap<u16, u8>,
    last_pat_pcr: Option<i64>,
    current_pcr: i64,
}

impl TsWriter {
    pub fn new(config: TsWriterConfig) -> Self {
        TsWriter { config, continuity: HashMap::new(), last_pat_pcr: None, current_pcr: 0 }
    }

    /// Live bitrate reconfiguration (spec.md §4.6: "Supports live
    /// bitrate reconfiguration: on a flag set externally, re-arm the TS
    /// library with updated muxrate").
    pub fn update_muxrate(&mut self, muxrate_bps: u32) {
        self.config.muxrate_bps = muxrate_bps;
    }

    fn next_continuity(&mut self, pid: u16) -> u8 {
        let counter = self.continuity.entry(pid).or_insert(0);
        let value = *counter;
        *counter = (*counter + 1) & 0x0F;
        value
    }

    fn pack_packet(&mut self, pid: u16, payload_unit_start: bool, pcr: Option<i64>, random_access: bool, payload: &[u8]) -> Bytes {
        let mut buf = BytesMut::with_capacity(TS_PACKET_SIZE);
        let adaptation = if pcr.is_some() || payload.len() < TS_PACKET_SIZE - 4 {
            let base_len = if pcr.is_some() { 8 } else { 2 };
            let available_for_payload = TS_PACKET_SIZE - 4 - base_len;
            let stuffing = available_for_payload.saturating_sub(payload.len());
            Some(AdaptationField { discontinuity: false, random_access, pcr, stuffing_bytes: stuffing })
        } else {
            None
        };

        let header = TsHeader {
            payload_unit_start,
            pid,
            adaptation_field_exists: adaptation.is_some(),
            contains_payload: !payload.is_empty(),
            continuity_counter: self.next_continuity(pid),
            ..Default::default()
        };
        header.write_to(&mut buf);
        if let Some(adaptation) = &adaptation {
            adaptation.write_to(&mut buf);
        }
        buf.extend_from_slice(payload);
        while buf.len() < TS_PACKET_SIZE {
            buf.put_u8(0xFF);
        }
        buf.truncate(TS_PACKET_SIZE);
        buf.freeze()
    }

    fn psi_entries(&self) -> (Bytes, Bytes) {
        let pat = build_pat(self.config.program_number, self.config.pmt_pid);
        let pmt_streams: Vec<PmtStreamEntry> = self
            .config
            .streams
            .iter()
            .map(|s| PmtStreamEntry { stream_type: stream_type_for(s.format), pid: s.pid })
            .collect();
        let pmt = build_pmt(self.config.program_number, self.config.pcr_pid, &pmt_streams);
        (pat.freeze(), pmt.freeze())
    }

    fn maybe_emit_psi(&mut self, packets: &mut Vec<Bytes>, pcr_sidecar: &mut Vec<i64>) {
        let due = match self.last_pat_pcr {
            None => true,
            Some(last) => self.current_pcr - last >= self.config.pat_period_27mhz,
        };
        if !due {
            return;
        }
        self.last_pat_pcr = Some(self.current_pcr);
        let (pat, pmt) = self.psi_entries();
        let pmt_pid = self.config.pmt_pid;

        let pat_pkt = self.pack_packet(PID_PAT, true, None, false, &pointer_field_wrap(&pat));
        packets.push(pat_pkt);
        pcr_sidecar.push(self.current_pcr);

        let pmt_pkt = self.pack_packet(pmt_pid, true, None, false, &pointer_field_wrap(&pmt));
        packets.push(pmt_pkt);
        pcr_sidecar.push(self.current_pcr);
    }

    fn fragment_frame(&mut self, frame: &CodedFrame, pid: u16, packets: &mut Vec<Bytes>, pcr_sidecar: &mut Vec<i64>) {
        let stream_id = if frame.is_video {
            STREAM_ID_VIDEO
        } else if frame.duration > 0 {
            STREAM_ID_AUDIO
        } else {
            STREAM_ID_PRIVATE
        };
        let pts_90khz = frame.real_pts / 300;
        let dts_90khz = if frame.real_dts != frame.real_pts { Some(frame.real_dts / 300) } else { None };
        let pes = build_pes(stream_id, pts_90khz, dts_90khz, frame.random_access, &frame.data);

        let is_pcr_pid = pid == self.config.pcr_pid;
        let mut offset = 0usize;
        let mut first = true;
        while offset < pes.len() {
            let pcr = if first && is_pcr_pid { Some(self.current_pcr) } else { None };
            let header_overhead = 4 + if pcr.is_some() { 8 } else { 0 };
            let remaining_capacity = TS_PACKET_SIZE - header_overhead;
            let take = remaining_capacity.min(pes.len() - offset);
            let chunk = &pes[offset..offset + take];
            let packet = self.pack_packet(pid, first, pcr, frame.random_access && first, chunk);
            packets.push(packet);
            pcr_sidecar.push(self.current_pcr);
            offset += take;
            first = false;
        }
    }

    /// The multiplexer's core call (spec.md §4.6): hand a batch of
    /// already-selected coded frames (video DTS-driven selection is the
    /// caller's job, `obe-mux::mux::Multiplexer`) and receive a
    /// `MuxedData` batch with one PCR sidecar entry per packet.
    pub fn write(&mut self, frames: &[CodedFrame]) -> MuxedData {
        let mut packets = Vec::new();
        let mut pcr_sidecar = Vec::new();

        if let Some(video_dts) = frames.iter().filter(|f| f.is_video).map(|f| f.real_dts).max() {
            self.current_pcr = video_dts;
        }

        self.maybe_emit_psi(&mut packets, &mut pcr_sidecar);

        for frame in frames {
            let pid = self
                .config
                .streams
                .iter()
                .find(|s| s.output_stream_id == frame.output_stream_id)
                .map(|s| s.pid)
                .unwrap_or(0x100);
            self.fragment_frame(frame, pid, &mut packets, &mut pcr_sidecar);
        }

        let mut all_bytes = BytesMut::with_capacity(packets.len() * TS_PACKET_SIZE);
        for pkt in &packets {
            all_bytes.extend_from_slice(pkt);
        }

        MuxedData { packets: all_bytes.freeze(), pcr: pcr_sidecar }
    }
}

/// PSI sections in a TS packet are prefixed with a one-byte
/// `pointer_field` (always 0 here, since each section starts its own
/// packet) when `payload_unit_start_indicator` is set.
fn pointer_field_wrap(section: &[u8]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(section.len() + 1);
    buf.put_u8(0);
    buf.extend_from_slice(section);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes as BytesAlias;

    fn video_frame(dts: i64, pts: i64, data: &[u8]) -> CodedFrame {
        CodedFrame {
            output_stream_id: 1,
            is_video: true,
            pts,
            real_pts: pts,
            real_dts: dts,
            cpb_initial_arrival_time: dts,
            cpb_final_arrival_time: dts,
            random_access: true,
            priority: true,
            duration: 0,
            data: BytesAlias::copy_from_slice(data),
            scte35_opaque: None,
        }
    }

    fn writer() -> TsWriter {
        let streams = vec![TsStreamConfig { output_stream_id: 1, pid: 0x100, format: StreamFormat::VideoAvc }];
        TsWriter::new(TsWriterConfig::new(1, 0x1000, 0x100, 6_000_000, streams))
    }

    #[test]
    fn first_batch_always_carries_pat_and_pmt() {
        let mut w = writer();
        let data = vec![0xAAu8; 50];
        let muxed = w.write(&[video_frame(0, 27_000, &data)]);
        assert_eq!(muxed.packets[0], 0x47);
        assert_eq!(muxed.packets[1] & 0x1F, 0x00); // PAT pid high bits = 0
        assert_eq!(muxed.packets[188], 0x47);
    }

    #[test]
    fn packet_count_matches_pcr_sidecar_length() {
        let mut w = writer();
        let data = vec![0xBBu8; 400];
        let muxed = w.write(&[video_frame(1000, 28_000, &data)]);
        assert_eq!(muxed.packet_count(), muxed.pcr.len());
    }

    #[test]
    fn pcr_is_non_decreasing_across_batches() {
        let mut w = writer();
        let first = w.write(&[video_frame(0, 27_000, &[1, 2, 3])]);
        let second = w.write(&[video_frame(10_000, 37_000, &[4, 5, 6])]);
        assert!(*second.pcr.last().unwrap() >= *first.pcr.last().unwrap());
    }
}
