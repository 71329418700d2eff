//! `muxed_data` and `buf_ref` (spec.md §3): the fixed-size TS packet batch
//! the mux-output smoother paces to each IP output, and the reference-
//! counted handle outputs share it through.

use bytes::Bytes;

/// One TS packet (188 bytes), the RTP-over-UDP payload is seven of these.
pub const TS_PACKET_SIZE: usize = 188;

/// `TS_PACKETS_SIZE` from spec.md §3: `7 * 188 = 1316`, the canonical
/// batch/payload size threaded from muxer through both smoothers to the
/// IP output.
pub const TS_PACKETS_SIZE: usize = 7 * TS_PACKET_SIZE;

/// A run of N transport packets plus N PCR sidecar values, one per packet
/// (spec.md §3). `pcr` entries are 27 MHz values and must be monotonically
/// non-decreasing across the whole output sequence (spec.md §3 invariant,
/// §8 property 1).
#[derive(Debug, Clone)]
pub struct MuxedData {
    pub packets: Bytes,
    pub pcr: Vec<i64>,
}

impl MuxedData {
    pub fn packet_count(&self) -> usize {
        self.packets.len() / TS_PACKET_SIZE
    }

    pub fn packet(&self, index: usize) -> &[u8] {
        let start = index * TS_PACKET_SIZE;
        &self.packets[start..start + TS_PACKET_SIZE]
    }
}

/// Reference-counted carrier for a fixed `TS_PACKETS_SIZE` batch and its
/// PCR sidecar (spec.md §3). `Bytes::clone` is itself refcounted, so this
/// struct is cheap to clone per-output; the underlying allocation is freed
/// once the last output worker drops its handle — the two-level
/// payload+handle split spec.md §9 calls out in the source's `buf_ref`
/// over `AVBufferPool` collapses into this single type.
#[derive(Debug, Clone)]
pub struct BufRef {
    pub packets: Bytes,
    pub pcr: std::sync::Arc<[i64]>,
}

impl BufRef {
    pub fn new(packets: Bytes, pcr: Vec<i64>) -> Self {
        BufRef { packets, pcr: pcr.into() }
    }

    pub fn packet_count(&self) -> usize {
        self.packets.len() / TS_PACKET_SIZE
    }

    pub fn packet(&self, index: usize) -> &[u8] {
        let start = index * TS_PACKET_SIZE;
        &self.packets[start..start + TS_PACKET_SIZE]
    }

    pub fn pcr_for(&self, index: usize) -> i64 {
        self.pcr[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_size_matches_seven_packets() {
        assert_eq!(TS_PACKETS_SIZE, 1316);
    }

    #[test]
    fn buf_ref_clone_shares_storage() {
        let data = vec![0u8; TS_PACKETS_SIZE];
        let b = BufRef::new(Bytes::from(data), vec![0; 7]);
        let b2 = b.clone();
        assert_eq!(b2.packet_count(), 7);
        assert_eq!(b.pcr_for(0), b2.pcr_for(0));
    }
}
