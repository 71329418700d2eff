//! SMPTE timecode as carried alongside a video `raw_frame` (spec.md §3,
//! "Picture fields"). Pure data: decoding the VANC/VITC source that
//! produces it is an input-adapter concern (spec.md §6).

use serde::{Deserialize, Serialize};

/// Hours/minutes/seconds/frames plus a drop-frame flag. Validity is
/// carried separately (`RawFrame::valid_timecode`) rather than folded into
/// an `Option`, matching the source's `valid_timecode` + plain struct split
/// so a frame can cheaply default to "no timecode" without re-allocating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timecode {
    pub hh: u8,
    pub mm: u8,
    pub ss: u8,
    pub ff: u8,
    pub drop_frame: bool,
}

impl Timecode {
    pub const fn new(hh: u8, mm: u8, ss: u8, ff: u8, drop_frame: bool) -> Self {
        Timecode { hh, mm, ss, ff, drop_frame }
    }

    /// Total frame count since 00:00:00:00, ignoring drop-frame
    /// arithmetic (good enough for ordering/comparison, not for NTSC
    /// drop-frame wall-clock accounting).
    pub fn to_frame_count(&self, fps_round: u8) -> u64 {
        let fps = fps_round as u64;
        ((self.hh as u64 * 3600 + self.mm as u64 * 60 + self.ss as u64) * fps) + self.ff as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_count_orders_correctly() {
        let a = Timecode::new(0, 0, 1, 0, false);
        let b = Timecode::new(0, 0, 1, 1, false);
        assert!(a.to_frame_count(25) < b.to_frame_count(25));
    }
}
