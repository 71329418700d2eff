//! RTP retransmission over RTCP feedback (spec.md §4.8.5, RFC 4585 NACK
//! + RFC 3611 XR, SPEC_FULL.md §B.2's RTT estimate): a sender-side cache
//! indexed by sequence number, and the RTCP packet types this stage
//! must parse and respond to.

use std::collections::VecDeque;

use bytes::{BufMut, Bytes, BytesMut};

pub const RTCP_PT_SR: u8 = 200;
pub const RTCP_PT_RR: u8 = 201;
pub const RTCP_PT_XR: u8 = 207;
pub const RTCP_PT_RTPFB: u8 = 205;
pub const RTPFB_FMT_NACK: u8 = 1;
pub const XR_BT_RRTP: u8 = 4;
pub const XR_BT_DLRR: u8 = 5;

struct CachedPacket {
    seq: u16,
    sent_at_mpeg: i64,
    data: Bytes,
}

/// One output's retransmission cache plus the RTCP state needed to
/// answer NACKs and compute RTT (SPEC_FULL.md §B.2).
pub struct ArqSession {
    cache: VecDeque<CachedPacket>,
    latency_27mhz: i64,
    last_sr_ntp_mid32: Option<u32>,
    last_sr_received_at_mpeg: Option<i64>,
}

/// One parsed RTCP packet relevant to this stage. Anything else in the
/// compound packet is ignored.
pub enum RtcpEvent {
    SenderReport { ntp_mid32: u32 },
    ReceiverReport { delay_since_last_sr_units: u32 },
    XrRrtp { ntp_mid32: u32 },
    Nack { seqs: Vec<u16> },
}

impl ArqSession {
    pub fn new(latency_ms: u64) -> Self {
        ArqSession { cache: VecDeque::new(), latency_27mhz: latency_ms as i64 * 27_000, last_sr_ntp_mid32: None, last_sr_received_at_mpeg: None }
    }

    /// Records a sent packet and evicts anything older than `latency`
    /// from the head of the cache (spec.md §4.8.5: "cache eviction drops
    /// packets older than `latency` from the head").
    pub fn note_sent(&mut self, seq: u16, data: Bytes, now_mpeg: i64) {
        self.cache.push_back(CachedPacket { seq, sent_at_mpeg: now_mpeg, data });
        while let Some(front) = self.cache.front() {
            if now_mpeg - front.sent_at_mpeg > self.latency_27mhz {
                self.cache.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn depth(&self) -> usize {
        self.cache.len()
    }

    /// Looks up a cached packet by sequence number for retransmission.
    pub fn lookup(&self, seq: u16) -> Option<Bytes> {
        self.cache.iter().find(|p| p.seq == seq).map(|p| p.data.clone())
    }

    /// Handles one parsed RTCP event, producing whatever response (XR
    /// DLRR) or retransmission set (NACK) it implies. SR updates the
    /// stored NTP<->RTP mapping so a later RR can estimate RTT.
    pub fn handle_event(&mut self, event: &RtcpEvent, now_mpeg: i64) -> ArqAction {
        match event {
            RtcpEvent::SenderReport { ntp_mid32 } => {
                self.last_sr_ntp_mid32 = Some(*ntp_mid32);
                self.last_sr_received_at_mpeg = Some(now_mpeg);
                ArqAction::None
            }
            RtcpEvent::ReceiverReport { delay_since_last_sr_units } => match self.estimate_rtt(*delay_since_last_sr_units, now_mpeg) {
                Some(rtt_ms) => ArqAction::RttEstimated(rtt_ms),
                None => ArqAction::None,
            },
            RtcpEvent::XrRrtp { ntp_mid32 } => ArqAction::SendXrDlrr { lrr: *ntp_mid32 },
            RtcpEvent::Nack { seqs } => {
                let packets = seqs.iter().filter_map(|seq| self.lookup(*seq)).collect();
                ArqAction::Retransmit(packets)
            }
        }
    }

    /// RTT estimate per SPEC_FULL.md §B.2: `RTT = now - delay_since_last_sr
    /// - last_sr_received_at`, all in the same 1/65536-second RTCP "DLSR"
    /// units, then converted to milliseconds.
    fn estimate_rtt(&self, delay_since_last_sr_units: u32, now_mpeg: i64) -> Option<u32> {
        let last_sr_mpeg = self.last_sr_received_at_mpeg?;
        let delay_27mhz = (delay_since_last_sr_units as i64 * 27_000_000) / 65_536;
        let rtt_27mhz = (now_mpeg - last_sr_mpeg) - delay_27mhz;
        Some((rtt_27mhz.max(0) / 27_000) as u32)
    }
}

pub enum ArqAction {
    None,
    RttEstimated(u32),
    SendXrDlrr { lrr: u32 },
    Retransmit(Vec<Bytes>),
}

/// Parses the compound RTCP packet on the reverse channel into the
/// subset of packet types this stage acts on (spec.md §4.8.5).
pub fn parse_rtcp(mut data: &[u8]) -> Vec<RtcpEvent> {
    let mut events = Vec::new();
    while data.len() >= 4 {
        let version_pt = data[0];
        let pt = data[1];
        let length_words = u16::from_be_bytes([data[2], data[3]]) as usize;
        let packet_len = (length_words + 1) * 4;
        if data.len() < packet_len {
            break;
        }
        let body = &data[4..packet_len.min(data.len())];

        match pt {
            RTCP_PT_SR if body.len() >= 16 => {
                let ntp_mid32 = u32::from_be_bytes([body[4], body[5], body[6], body[7]]);
                events.push(RtcpEvent::SenderReport { ntp_mid32 });
            }
            RTCP_PT_RR if body.len() >= 20 => {
                let delay_since_last_sr_units = u32::from_be_bytes([body[16], body[17], body[18], body[19]]);
                events.push(RtcpEvent::ReceiverReport { delay_since_last_sr_units });
            }
            RTCP_PT_XR => {
                let mut rest = &body[4..];
                while rest.len() >= 4 {
                    let bt = rest[0];
                    let block_words = u16::from_be_bytes([rest[2], rest[3]]) as usize;
                    let block_len = (block_words + 1) * 4;
                    if rest.len() < block_len {
                        break;
                    }
                    if bt == XR_BT_RRTP && block_len >= 8 {
                        let ntp_mid32 = u32::from_be_bytes([rest[4], rest[5], rest[6], rest[7]]);
                        events.push(RtcpEvent::XrRrtp { ntp_mid32 });
                    }
                    rest = &rest[block_len..];
                }
            }
            RTCP_PT_RTPFB if (version_pt & 0x1F) == RTPFB_FMT_NACK && body.len() >= 8 => {
                let mut seqs = Vec::new();
                let mut fci = &body[8..];
                while fci.len() >= 4 {
                    let pid = u16::from_be_bytes([fci[0], fci[1]]);
                    let bitmask = u16::from_be_bytes([fci[2], fci[3]]);
                    seqs.push(pid);
                    for bit in 0..16 {
                        if bitmask & (1 << bit) != 0 {
                            seqs.push(pid.wrapping_add(bit + 1));
                        }
                    }
                    fci = &fci[4..];
                }
                events.push(RtcpEvent::Nack { seqs });
            }
            _ => {}
        }

        data = &data[packet_len..];
    }
    events
}

/// Builds an RTCP XR DLRR report block (spec.md §4.8.5): `(LRR = received
/// NTP >> 16, DLRR = 0)`, responded immediately so the delay term is
/// negligible.
pub fn build_xr_dlrr(ssrc: u32, lrr: u32) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_u8(0x80);
    buf.put_u8(RTCP_PT_XR);
    buf.put_u16(3); // length in words - 1: 4 header words + ... (fixed small report)
    buf.put_u32(ssrc);
    buf.put_u8(XR_BT_DLRR);
    buf.put_u8(0);
    buf.put_u16(2);
    buf.put_u32(ssrc);
    buf.put_u32(lrr);
    buf.put_u32(0); // DLRR = 0
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender_report(ntp_mid32: u32) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_u8(0x81);
        buf.put_u8(RTCP_PT_SR);
        buf.put_u16(6);
        buf.put_u32(0x1234_5678); // SSRC
        buf.put_u32(0); // NTP seconds
        buf.put_u32(ntp_mid32); // NTP fraction (stand-in for the mid32 field)
        buf.put_u32(0); // RTP timestamp
        buf.put_u32(0); // packet count
        buf.put_u32(0); // octet count
        buf.freeze()
    }

    #[test]
    fn parses_sender_report_ntp_field() {
        let events = parse_rtcp(&sender_report(0xCAFEBABE));
        assert!(matches!(events[0], RtcpEvent::SenderReport { ntp_mid32: 0xCAFEBABE }));
    }

    #[test]
    fn retransmission_cache_evicts_by_latency() {
        let mut session = ArqSession::new(100); // 100ms
        session.note_sent(1, Bytes::from_static(b"a"), 0);
        session.note_sent(2, Bytes::from_static(b"b"), 50 * 27_000);
        session.note_sent(3, Bytes::from_static(b"c"), 200 * 27_000);
        assert!(session.lookup(1).is_none());
        assert!(session.lookup(3).is_some());
    }

    #[test]
    fn nack_retransmits_cached_packets() {
        let mut session = ArqSession::new(1000);
        session.note_sent(10, Bytes::from_static(b"ten"), 0);
        let event = RtcpEvent::Nack { seqs: vec![10, 11] };
        match session.handle_event(&event, 0) {
            ArqAction::Retransmit(packets) => assert_eq!(packets.len(), 1),
            _ => panic!("expected retransmit action"),
        }
    }

    #[test]
    fn rtt_estimate_requires_prior_sender_report() {
        let mut session = ArqSession::new(1000);
        session.handle_event(&RtcpEvent::SenderReport { ntp_mid32: 0 }, 0);
        match session.handle_event(&RtcpEvent::ReceiverReport { delay_since_last_sr_units: 0 }, 27_000_000) {
            ArqAction::RttEstimated(rtt_ms) => assert_eq!(rtt_ms, 1000),
            _ => panic!("expected RTT estimate"),
        }
    }
}
