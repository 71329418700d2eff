//! Program-Specific Information: PAT and PMT section construction
//! (ISO/IEC 13818-1 §2.4.4), grounded on the PAT/PMT entry layout from
//! `bkataru-workshop-vdkio`'s `format::ts::types` module in the retrieval
//! pack, generalized to this crate's stream-format table and rebuilt with
//! a real CRC32 rather than a stub.

use bytes::{BufMut, BytesMut};

use crate::crc32::crc32_mpeg;

pub const PID_PAT: u16 = 0x0000;
pub const TABLE_ID_PAT: u8 = 0x00;
pub const TABLE_ID_PMT: u8 = 0x02;

/// Maps an obe-core `StreamFormat` onto its MPEG-TS `stream_type` byte
/// (spec.md §4.6: "Chooses stream_id and stream_format per the codec ->
/// MPEG-TS stream-format table").
pub fn stream_type_for(format: obe_core::descriptor::StreamFormat) -> u8 {
    use obe_core::descriptor::StreamFormat::*;
    match format {
        VideoAvc => 0x1B,
        AudioMp2 => 0x04,
        AudioAc3 => 0x81,
        AudioAac => 0x0F,
        AudioS302m => 0x06, // private, with a registration descriptor
        DvbVbi => 0x06,
        DvbTeletext => 0x06,
        DvbSubtitle => 0x06,
    }
}

pub struct PmtStreamEntry {
    pub stream_type: u8,
    pub pid: u16,
}

/// Builds a complete PAT section (including the 8-byte table header and
/// trailing CRC32), mapping one program number to its PMT PID.
pub fn build_pat(program_number: u16, pmt_pid: u16) -> BytesMut {
    let mut section = BytesMut::new();
    // section_syntax_indicator=1, reserved bits, section_length filled below
    section.put_u16(program_number);
    section.put_u16(0xC000 | (pmt_pid & 0x1FFF));
    build_psi_section(TABLE_ID_PAT, program_number, &section)
}

/// Builds a complete PMT section for one program with the given PCR PID
/// and elementary stream list.
pub fn build_pmt(program_number: u16, pcr_pid: u16, streams: &[PmtStreamEntry]) -> BytesMut {
    let mut section = BytesMut::new();
    section.put_u16(0xE000 | (pcr_pid & 0x1FFF));
    section.put_u16(0xF000); // program_info_length = 0, no descriptors
    for s in streams {
        section.put_u8(s.stream_type);
        section.put_u16(0xE000 | (s.pid & 0x1FFF));
        section.put_u16(0xF000); // ES_info_length = 0
    }
    build_psi_section(TABLE_ID_PMT, program_number, &section)
}

/// Wraps a PSI section's payload (everything after the 8-byte fixed
/// header, before the CRC) with the table_id, section_length, table
/// extension id (`program_number` for both PAT and PMT), version/current
/// fields, and appends the CRC32 over everything before it.
fn build_psi_section(table_id: u8, table_id_extension: u16, payload: &[u8]) -> BytesMut {
    let mut header = BytesMut::new();
    header.put_u8(table_id);
    // section_length covers everything after this 2-byte field up to and
    // including the CRC: table_id_ext(2) + reserved/version/current(1) +
    // section_number(1) + last_section_number(1) + payload + crc(4).
    let section_length = 5 + payload.len() + 4;
    header.put_u16(0xB000 | (section_length as u16 & 0x0FFF));
    header.put_u16(table_id_extension);
    header.put_u8(0xC1); // reserved=11, version_number=0, current_next_indicator=1
    header.put_u8(0x00); // section_number
    header.put_u8(0x00); // last_section_number
    header.extend_from_slice(payload);

    let crc = crc32_mpeg(&header);
    header.put_u32(crc);
    header
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pat_section_starts_with_table_id() {
        let pat = build_pat(1, 0x1000);
        assert_eq!(pat[0], TABLE_ID_PAT);
    }

    #[test]
    fn pmt_section_lists_every_stream() {
        let streams = vec![
            PmtStreamEntry { stream_type: 0x1B, pid: 0x100 },
            PmtStreamEntry { stream_type: 0x0F, pid: 0x101 },
        ];
        let pmt = build_pmt(1, 0x100, &streams);
        assert_eq!(pmt[0], TABLE_ID_PMT);
        // fixed header (8) + program_info_length(2) + 2 * (1+2+2) entries + crc(4)
        assert_eq!(pmt.len(), 8 + 2 + 2 * 5 + 4);
    }

    #[test]
    fn crc_is_appended_over_preceding_bytes() {
        let pat = build_pat(1, 0x1000);
        let (body, crc_bytes) = pat.split_at(pat.len() - 4);
        let crc = u32::from_be_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
        assert_eq!(crc, crc32_mpeg(body));
    }
}
