//! RTP header packing (spec.md §4.8.2, RFC 3550 §5.1): a fixed 12-byte
//! header with no CSRC list or extension, used for both the MP2T media
//! stream (PT=33) and FEC parity/repair packets (PT=96).

use bytes::{BufMut, Bytes, BytesMut};
use rand::RngCore;

pub const RTP_VERSION: u8 = 2;
pub const PT_MP2T: u8 = 33;
pub const PT_FEC: u8 = 96;
pub const RTP_HEADER_LEN: usize = 12;

/// One RTP session's sequence counter and fixed SSRC (spec.md §4.8.2:
/// "fixed per-session random SSRC").
pub struct RtpSession {
    ssrc: u32,
    seq: u16,
}

impl RtpSession {
    pub fn new() -> Self {
        RtpSession { ssrc: rand::thread_rng().next_u32(), seq: 0 }
    }

    pub fn with_ssrc(ssrc: u32) -> Self {
        RtpSession { ssrc, seq: 0 }
    }

    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    /// Wraps the 16-bit sequence counter and returns the value used for
    /// this packet.
    pub fn next_seq(&mut self) -> u16 {
        let seq = self.seq;
        self.seq = self.seq.wrapping_add(1);
        seq
    }

    /// Builds an RTP packet: 12-byte header followed by `payload`.
    /// `timestamp_90khz` is the 90 kHz value derived from the batch's
    /// first PCR (spec.md §4.8.2).
    pub fn build_packet(&mut self, payload_type: u8, timestamp_90khz: u32, payload: &[u8]) -> Bytes {
        let seq = self.next_seq();
        let mut buf = BytesMut::with_capacity(RTP_HEADER_LEN + payload.len());
        buf.put_u8((RTP_VERSION << 6) & 0xC0);
        buf.put_u8(payload_type & 0x7F);
        buf.put_u16(seq);
        buf.put_u32(timestamp_90khz);
        buf.put_u32(self.ssrc);
        buf.extend_from_slice(payload);
        buf.freeze()
    }
}

impl Default for RtpSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Rescales a 27 MHz PCR value to the 90 kHz RTP timestamp domain
/// (spec.md §4.8.2).
pub fn pcr_to_rtp_timestamp(pcr_27mhz: i64) -> u32 {
    ((pcr_27mhz / 300) & 0xFFFF_FFFF) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_carries_version_pt_and_ssrc() {
        let mut session = RtpSession::with_ssrc(0xDEAD_BEEF);
        let packet = session.build_packet(PT_MP2T, 1000, &[1, 2, 3]);
        assert_eq!(packet[0] >> 6, RTP_VERSION);
        assert_eq!(packet[1] & 0x7F, PT_MP2T);
        assert_eq!(u32::from_be_bytes([packet[8], packet[9], packet[10], packet[11]]), 0xDEAD_BEEF);
    }

    #[test]
    fn sequence_number_wraps() {
        let mut session = RtpSession::with_ssrc(1);
        session.seq = 0xFFFF;
        let first = session.build_packet(PT_MP2T, 0, &[]);
        let second = session.build_packet(PT_MP2T, 0, &[]);
        assert_eq!(u16::from_be_bytes([first[2], first[3]]), 0xFFFF);
        assert_eq!(u16::from_be_bytes([second[2], second[3]]), 0x0000);
    }
}
