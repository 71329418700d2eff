//! Ancillary encapsulation (spec.md §4.3 "Ancillary encapsulation"):
//! CEA-608/708 captions and bar data get packed into an AVC user-data-
//! registered ITU-T T.35 SEI payload; AFD rides alongside as its own
//! user-data item for the muxer/descriptor layer to carry.
//!
//! Hand-rolled big-endian byte packing per spec.md §9's redesign note
//! ("replace type-punning unions with explicit byte-aligned load/store
//! helpers") — no bitstream union, just push onto a `Vec<u8>`.

use obe_core::frame::UserData;

/// `itu_t_t35_country_code` for the US (spec.md §4.3: `country 0xB5`).
pub const ITU_T_T35_COUNTRY_US: u8 = 0xB5;
/// `itu_t35_provider_code` for ATSC (spec.md §4.3: `provider 0x31`).
pub const ATSC_PROVIDER_CODE: u16 = 0x0031;
/// `user_identifier` for ATSC A/53 caption data (spec.md §4.3: `"GA94"`).
pub const ATSC_USER_ID: [u8; 4] = *b"GA94";

/// `cc_count` table indexed by nominal framerate (spec.md §4.3: "cc_count
/// from a small table indexed by framerate"). Values follow CEA-708's
/// guidance for how many CC byte-pairs accompany one picture at a given
/// cadence so the 9600 bit/s caption channel keeps up.
pub fn cc_count_for_framerate(fps_num: u32, fps_den: u32) -> u8 {
    let fps = fps_num as f64 / fps_den as f64;
    if fps >= 59.0 {
        10
    } else if fps >= 49.0 {
        8
    } else if fps >= 29.0 {
        20
    } else if fps >= 24.0 {
        25
    } else {
        20
    }
}

/// Build the `user_data_registered_itu_t_t35` SEI payload body (not
/// including the SEI NAL's `payload_type`/`payload_size` prefix, which is
/// a codec-specific concern left to the video encoder wrapper).
///
/// Layout: `country_code(1) | provider_code(2) | user_id(4) |
/// cc_data_payload...`.
pub fn build_cea608_708_sei(cc_data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(7 + cc_data.len());
    out.push(ITU_T_T35_COUNTRY_US);
    out.extend_from_slice(&ATSC_PROVIDER_CODE.to_be_bytes());
    out.extend_from_slice(&ATSC_USER_ID);
    out.extend_from_slice(cc_data);
    out
}

/// CDP (CEA-708 Caption Distribution Packet) framing: header, a time code
/// section (omitted here — not carried by `UserData::Cea708Cdp`), the
/// `cc_data` service block, and a footer with a running sequence counter.
pub struct Cdp {
    sequence: u16,
}

impl Default for Cdp {
    fn default() -> Self {
        Cdp { sequence: 0 }
    }
}

impl Cdp {
    const CDP_IDENTIFIER: u16 = 0x9669;

    /// Wraps raw cc_data byte-pairs (each `[marker, cc_data_1, cc_data_2]`
    /// already produced by the CEA-608 line-21 or CEA-708 DTVCC decoder)
    /// into one CDP fragment, the unit the filter stage encapsulates per
    /// frame.
    pub fn wrap(&mut self, cc_data: &[u8], framerate_code: u8) -> Vec<u8> {
        self.sequence = self.sequence.wrapping_add(1);
        let mut body = Vec::new();
        body.extend_from_slice(&Self::CDP_IDENTIFIER.to_be_bytes());
        // cdp_length filled in below once known.
        body.push(0);
        body.push(0xC0 | (framerate_code & 0x0F) << 0);
        // cdp_frame_rate byte duplicated per spec's "time_code_present=0,
        // ccdata_present=1" framing bits.
        body.push(0x42);
        body.push(0x72 | ((cc_data.len() as u8 / 3) & 0x1F));
        body.extend_from_slice(cc_data);
        body.push(0x74);
        body.extend_from_slice(&self.sequence.to_be_bytes());
        // checksum: two's-complement sum of all preceding bytes, mod 256.
        let sum: u8 = body.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
        body.push((!sum).wrapping_add(1));
        let len = body.len() as u8;
        body[2] = len;
        body
    }
}

/// Bar data payload (spec.md §4.3 "Bar data is appended when present"):
/// top/bottom or left/right letterbox bar line counts, per CEA-805/ATSC
/// A/53 bar_data() syntax — four 16-bit fields, big-endian.
pub fn encode_bar_data(top: u16, bottom: u16, left: u16, right: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(8);
    out.extend_from_slice(&top.to_be_bytes());
    out.extend_from_slice(&bottom.to_be_bytes());
    out.extend_from_slice(&left.to_be_bytes());
    out.extend_from_slice(&right.to_be_bytes());
    out
}

/// Which `UserData` item types a given output stream subscribes to
/// encapsulating (spec.md §4.3: "if the output stream set has subscribed
/// to that type at `USER_DATA_LOCATION_FRAME`").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserDataSubscription {
    pub cea608: bool,
    pub cea708: bool,
    pub afd: bool,
    pub bar_data: bool,
}

/// Walks a frame's `user_data[]` and emits the SEI payloads the
/// subscription allows, in order. AFD is returned separately since it
/// does not ride in the T.35 SEI (it has its own descriptor slot at the
/// PMT/PES level, outside this crate's concern).
pub struct EncapsulatedUserData {
    pub t35_sei_payloads: Vec<Vec<u8>>,
    pub afd: Option<(u8, bool)>,
}

pub fn encapsulate_user_data(
    items: &[UserData],
    subscription: UserDataSubscription,
    cdp: &mut Cdp,
    framerate_code: u8,
) -> EncapsulatedUserData {
    let mut t35_sei_payloads = Vec::new();
    let mut afd = None;
    let mut pending_bar: Option<Vec<u8>> = None;

    for item in items {
        match item {
            UserData::Cea608 { data, .. } if subscription.cea608 => {
                t35_sei_payloads.push(build_cea608_708_sei(data));
            }
            UserData::Cea708Cdp { data } if subscription.cea708 => {
                let wrapped = cdp.wrap(data, framerate_code);
                t35_sei_payloads.push(build_cea608_708_sei(&wrapped));
            }
            UserData::Afd { afd: afd_code, is_wide } if subscription.afd => {
                afd = Some((*afd_code, *is_wide));
            }
            UserData::BarData { top, bottom, left, right } if subscription.bar_data => {
                pending_bar = Some(encode_bar_data(*top, *bottom, *left, *right));
            }
            _ => {}
        }
    }

    if let Some(bar) = pending_bar {
        t35_sei_payloads.push(build_cea608_708_sei(&bar));
    }

    EncapsulatedUserData { t35_sei_payloads, afd }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sei_payload_has_atsc_header() {
        let sei = build_cea608_708_sei(&[1, 2, 3]);
        assert_eq!(sei[0], ITU_T_T35_COUNTRY_US);
        assert_eq!(&sei[1..3], &ATSC_PROVIDER_CODE.to_be_bytes());
        assert_eq!(&sei[3..7], &ATSC_USER_ID);
        assert_eq!(&sei[7..], &[1, 2, 3]);
    }

    #[test]
    fn cc_count_table_matches_common_framerates() {
        assert_eq!(cc_count_for_framerate(60, 1), 10);
        assert_eq!(cc_count_for_framerate(50, 1), 8);
        assert_eq!(cc_count_for_framerate(30000, 1001), 20);
        assert_eq!(cc_count_for_framerate(25, 1), 20);
    }

    #[test]
    fn cdp_sequence_increments_each_call() {
        let mut cdp = Cdp::default();
        let a = cdp.wrap(&[0xFC, 0x80, 0x80], 4);
        let b = cdp.wrap(&[0xFC, 0x80, 0x80], 4);
        assert_ne!(&a[a.len() - 3..a.len() - 1], &b[b.len() - 3..b.len() - 1]);
    }

    #[test]
    fn subscription_gating_drops_unsubscribed_types() {
        let items = vec![
            UserData::Cea608 { field: 0, data: vec![0xFC, 0x80, 0x80] },
            UserData::Afd { afd: 8, is_wide: true },
        ];
        let mut cdp = Cdp::default();
        let out = encapsulate_user_data(&items, UserDataSubscription { afd: true, ..Default::default() }, &mut cdp, 4);
        assert!(out.t35_sei_payloads.is_empty());
        assert_eq!(out.afd, Some((8, true)));
    }
}
