//! PES (Packetized Elementary Stream) header construction, ISO/IEC
//! 13818-1 §2.4.3.7. PTS/DTS are 33-bit values at 90 kHz, packed with the
//! standard `0010`/`0011` marker-bit framing.

use bytes::{BufMut, BytesMut};

pub const STREAM_ID_VIDEO: u8 = 0xE0;
pub const STREAM_ID_AUDIO: u8 = 0xC0;
pub const STREAM_ID_PRIVATE: u8 = 0xBD;

fn write_timestamp(buf: &mut BytesMut, marker_bits: u8, ts_90khz: i64) {
    let ts = ts_90khz as u64 & 0x1_FFFF_FFFF;
    let b0 = (marker_bits << 4) | (((ts >> 30) & 0x07) as u8) << 1 | 1;
    let b1 = ((ts >> 22) & 0xFF) as u8;
    let b2 = ((((ts >> 15) & 0x7F) as u8) << 1) | 1;
    let b3 = ((ts >> 7) & 0xFF) as u8;
    let b4 = (((ts & 0x7F) as u8) << 1) | 1;
    buf.put_u8(b0);
    buf.put_u8(b1);
    buf.put_u8(b2);
    buf.put_u8(b3);
    buf.put_u8(b4);
}

/// Builds one PES packet: start code + stream_id + packet_length +
/// optional-header flags/PTS/DTS + the elementary stream payload. The
/// caller is responsible for fragmenting this across TS packets.
pub fn build_pes(stream_id: u8, pts_90khz: i64, dts_90khz: Option<i64>, random_access: bool, payload: &[u8]) -> BytesMut {
    let has_dts = dts_90khz.is_some_and(|d| d != pts_90khz);
    let pts_dts_flags = if has_dts { 0b11 } else { 0b10 };
    let ts_field_len = if has_dts { 10 } else { 5 };

    let mut pes = BytesMut::new();
    pes.put_u8(0x00);
    pes.put_u8(0x00);
    pes.put_u8(0x01);
    pes.put_u8(stream_id);

    let pes_header_data_len = ts_field_len;
    let packet_length = 3 + pes_header_data_len + payload.len();
    pes.put_u16(if packet_length > 0xFFFF { 0 } else { packet_length as u16 });

    pes.put_u8(0x80 | if random_access { 0x00 } else { 0x00 }); // '10' marker, no scrambling
    let mut flags2 = (pts_dts_flags & 0x03) << 6;
    if random_access {
        flags2 |= 0x00;
    }
    pes.put_u8(flags2);
    pes.put_u8(pes_header_data_len as u8);

    let pts_marker = if has_dts { 0x3 } else { 0x2 };
    write_timestamp(&mut pes, pts_marker, pts_90khz);
    if has_dts {
        write_timestamp(&mut pes, 0x1, dts_90khz.expect("has_dts implies dts_90khz is Some"));
    }

    pes.extend_from_slice(payload);
    pes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pes_starts_with_start_code_and_stream_id() {
        let pes = build_pes(STREAM_ID_VIDEO, 1000, Some(900), true, &[1, 2, 3]);
        assert_eq!(&pes[0..3], &[0x00, 0x00, 0x01]);
        assert_eq!(pes[3], STREAM_ID_VIDEO);
    }

    #[test]
    fn pts_only_header_is_shorter_than_pts_dts() {
        let pts_only = build_pes(STREAM_ID_AUDIO, 1000, None, false, &[]);
        let pts_dts = build_pes(STREAM_ID_VIDEO, 1000, Some(500), false, &[]);
        assert!(pts_only.len() < pts_dts.len());
    }

    #[test]
    fn pts_only_marker_nibble_is_0010() {
        let pes = build_pes(STREAM_ID_AUDIO, 1000, None, false, &[]);
        // PES header starts at byte 9 (after the 6-byte fixed header + 3 flag/length bytes).
        assert_eq!(pes[9] >> 4, 0b0010);
    }

    #[test]
    fn pts_dts_marker_nibbles_are_0011_and_0001() {
        let pes = build_pes(STREAM_ID_VIDEO, 1000, Some(500), false, &[]);
        assert_eq!(pes[9] >> 4, 0b0011);
        assert_eq!(pes[14] >> 4, 0b0001);
    }
}
