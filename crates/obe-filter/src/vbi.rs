//! VBI + Teletext extraction (spec.md §4.3): decode raw VBI lines into
//! DVB-VBI/Teletext units, packed toward the configured output PIDs with
//! per-line field parity and the configured language table.

use obe_core::frame::UserData;

/// One decoded teletext packet (EN 300 706 framing): magazine/row address
/// plus the 40-byte payload the OP47 (spec.md GLOSSARY) transport carries
/// in VANC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeletextPacket {
    pub magazine: u8,
    pub row: u8,
    pub field: u8,
    pub data: [u8; 40],
}

/// DVB-VBI / DVB-Teletext PES data units (ETSI EN 300 472 / EN 300 468
/// data_unit framing): `data_unit_id | data_unit_length | data_field`.
pub const DATA_UNIT_ID_TELETEXT_NON_SUBTITLE: u8 = 0x02;
pub const DATA_UNIT_ID_VBI_LINE: u8 = 0xB5;
pub const DATA_UNIT_ID_STUFFING: u8 = 0xFF;

/// Parses one OP47-framed VBI line into teletext packets. OP47 (spec.md
/// GLOSSARY) multiplexes up to 5 teletext packets per ANC packet with a
/// `des_id`/`data_unit_id` header; this strips that framing and returns
/// the per-packet magazine/row/payload triples with `field` carried
/// through from the caller (field parity isn't recoverable from the byte
/// stream alone — it comes from which VANC line the caller read it from).
pub fn parse_op47_line(field: u8, raw: &[u8]) -> Vec<TeletextPacket> {
    let mut packets = Vec::new();
    // OP47 ANC payload: 3-byte header (des_id=0x10/0x1F, data_identifier),
    // then one or more 45-byte teletext structures (framing code + magazine
    // + 40 bytes of data), repeated until the payload is exhausted.
    const UNIT: usize = 45;
    if raw.len() < 3 {
        return packets;
    }
    let mut offset = 3;
    while offset + UNIT <= raw.len() {
        let framing_code = raw[offset];
        if framing_code != 0xE4 {
            offset += UNIT;
            continue;
        }
        let mrag = raw[offset + 1];
        let magazine = mrag & 0x07;
        let row = (mrag >> 3) & 0x1F;
        let mut data = [0u8; 40];
        data.copy_from_slice(&raw[offset + 2..offset + 2 + 40]);
        packets.push(TeletextPacket { magazine, row, field, data });
        offset += UNIT;
    }
    packets
}

/// Packs a batch of teletext packets (sharing one PES-sized window) into
/// the DVB-Teletext PES data-field payload: one `data_unit_id | length |
/// field_parity+line_offset | framing_code | magazine/row | data` record
/// per packet (ETSI EN 300 472 §4.3).
pub fn pack_dvb_teletext_data_units(packets: &[TeletextPacket]) -> Vec<u8> {
    let mut out = Vec::with_capacity(packets.len() * 46);
    for pkt in packets {
        out.push(DATA_UNIT_ID_TELETEXT_NON_SUBTITLE);
        out.push(44); // data_unit_length: field_parity byte + framing + mrag + 40 data bytes
        let field_parity_and_offset = 0xC0 | (pkt.field & 0x01) << 5;
        out.push(field_parity_and_offset);
        out.push(0xE4);
        let mrag = (pkt.magazine & 0x07) | ((pkt.row & 0x1F) << 3);
        out.push(mrag);
        out.extend_from_slice(&pkt.data);
    }
    out
}

/// Packs raw VBI lines (non-teletext, e.g. WSS/closed-caption-on-VBI)
/// into DVB-VBI data units per ETSI EN 301 775.
pub fn pack_dvb_vbi_data_units(lines: &[(u32, u8, Vec<u8>)]) -> Vec<u8> {
    let mut out = Vec::new();
    for (_line, field, data) in lines {
        out.push(DATA_UNIT_ID_VBI_LINE);
        out.push((data.len() + 1) as u8);
        out.push(0xC0 | (field & 0x01) << 5);
        out.extend_from_slice(data);
    }
    out
}

/// Extracts every `UserData::VbiLine` item from a frame's user-data list,
/// parses OP47 teletext, and returns the packed PES payload ready for the
/// DVB-Teletext output stream, or `None` if nothing was present.
pub fn extract_teletext_pes_payload(user_data: &[UserData]) -> Option<Vec<u8>> {
    let mut packets = Vec::new();
    for item in user_data {
        if let UserData::VbiLine { line: 9, field, data } = item {
            packets.extend(parse_op47_line(*field, data));
        }
    }
    if packets.is_empty() {
        None
    } else {
        Some(pack_dvb_teletext_data_units(&packets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_op47_line() -> Vec<u8> {
        let mut raw = vec![0x10, 0x02, 0x2B]; // des_id + header bytes
        raw.push(0xE4); // framing code
        let mrag: u8 = 0 | (0 << 3); // magazine 0, row 0 (page header row)
        raw.push(mrag);
        raw.extend_from_slice(&[0x20; 40]); // blank page "100" would be encoded via Hamming-8/4 normally
        raw
    }

    #[test]
    fn parses_single_teletext_packet_from_op47() {
        let raw = sample_op47_line();
        let packets = parse_op47_line(0, &raw);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].data.len(), 40);
    }

    #[test]
    fn pack_round_trips_packet_count() {
        let raw = sample_op47_line();
        let packets = parse_op47_line(1, &raw);
        let packed = pack_dvb_teletext_data_units(&packets);
        assert_eq!(packed.len(), 46);
        assert_eq!(packed[0], DATA_UNIT_ID_TELETEXT_NON_SUBTITLE);
    }

    #[test]
    fn extract_from_frame_user_data_finds_line_9() {
        let raw = sample_op47_line();
        let user_data = vec![UserData::VbiLine { line: 9, field: 0, data: raw }];
        let payload = extract_teletext_pes_payload(&user_data);
        assert!(payload.is_some());
    }

    #[test]
    fn extract_returns_none_when_absent() {
        assert!(extract_teletext_pes_payload(&[]).is_none());
    }
}
