//! ProMPEG COP3 row/column FEC matrix (spec.md §4.8.3, SPEC_FULL.md
//! §B.4): an `L` (columns) x `D` (rows) matrix of RTP media packets.
//! Row parity XORs one row of `L` packets; column parity XORs one
//! column of `D` packets spaced `L` sequence numbers apart.
//!
//! Both modes compute a whole block's `L` column parities at once when
//! the matrix fills, then hand them to a trickle queue and emit one per
//! subsequent media packet instead of bursting (`write_rtp_pkt` in
//! `examples/original_source/output/ip/ip.c` keeps two alternating
//! `column_data` buffers so one phase drains while the other fills; a
//! FIFO reproduces that naturally since at most the previous block's
//! leftovers and the block that just completed are ever pending at
//! once). Block-aligned vs. non-block-aligned is a send-schedule
//! distinction only (SPEC_FULL.md §B.4: "the math is identical").

use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};

use super::header::{FecHeader, FecKind};

#[derive(Debug, Default)]
pub struct Cop3Emission {
    pub row_parity: Option<Bytes>,
    pub column_parity: Vec<Bytes>,
}

pub struct Cop3Matrix {
    l: usize,
    d: usize,
    grid: Vec<Option<Bytes>>,
    row_count: Vec<usize>,
    col_count: Vec<usize>,
    filled: usize,
    block_base_seq: u32,
    pending_column_parity: VecDeque<Bytes>,
}

fn xor_into(accum: &mut [u8], packet: &[u8]) {
    for (i, byte) in packet.iter().enumerate() {
        if i < accum.len() {
            accum[i] ^= byte;
        }
    }
}

impl Cop3Matrix {
    pub fn new(l: usize, d: usize) -> Self {
        Cop3Matrix {
            l,
            d,
            grid: vec![None; l * d],
            row_count: vec![0; d],
            col_count: vec![0; l],
            filled: 0,
            block_base_seq: 0,
            pending_column_parity: VecDeque::new(),
        }
    }

    fn reset_block(&mut self, next_base_seq: u32) {
        self.grid.iter_mut().for_each(|slot| *slot = None);
        self.row_count.iter_mut().for_each(|c| *c = 0);
        self.col_count.iter_mut().for_each(|c| *c = 0);
        self.filled = 0;
        self.block_base_seq = next_base_seq;
    }

    fn row_packets(&self, row: usize) -> Vec<&Bytes> {
        (0..self.l).map(|c| self.grid[row * self.l + c].as_ref().expect("row complete")).collect()
    }

    fn col_packets(&self, col: usize) -> Vec<&Bytes> {
        (0..self.d).map(|r| self.grid[r * self.l + col].as_ref().expect("column complete")).collect()
    }

    fn build_parity(&self, packets: &[&Bytes], kind: FecKind, snbase: u32, n: u8, offset: u8) -> Bytes {
        let longest = packets.iter().map(|p| p.len()).max().unwrap_or(0);
        let mut payload_xor = vec![0u8; longest.saturating_sub(12)];
        let mut ts_recovery = 0u32;
        let mut pt_recovery = 0u8;
        let mut length_recovery = 0u16;
        for packet in packets {
            if packet.len() >= 12 {
                xor_into(&mut payload_xor, &packet[12..]);
                let ts = u32::from_be_bytes([packet[4], packet[5], packet[6], packet[7]]);
                ts_recovery ^= ts;
                pt_recovery ^= packet[1] & 0x7F;
            }
            length_recovery ^= packet.len() as u16;
        }

        let mask = match kind {
            FecKind::Row => (1u32 << n.min(24)) - 1,
            FecKind::Column => 0,
        };

        let header = FecHeader { snbase, length_recovery, pt_recovery, mask, ts_recovery, n, kind, offset };
        let mut buf = BytesMut::with_capacity(FecHeader::LEN + payload_xor.len());
        header.write_to(&mut buf);
        buf.extend_from_slice(&payload_xor);
        buf.freeze()
    }

    /// Feeds one RTP media packet (already built with `RtpSession`) into
    /// the matrix at the next sequential position. `seq` is the packet's
    /// RTP sequence number, used as the FEC header's `SNBase`.
    pub fn push(&mut self, packet: Bytes, seq: u16) -> Cop3Emission {
        let idx = self.filled;
        let row = idx / self.l;
        let col = idx % self.l;
        if idx == 0 {
            self.block_base_seq = seq as u32;
        }
        self.grid[idx] = Some(packet);
        self.row_count[row] += 1;
        self.col_count[col] += 1;
        self.filled += 1;

        let mut emission = Cop3Emission::default();

        if self.row_count[row] == self.l {
            let packets = self.row_packets(row);
            let row_snbase = self.block_base_seq.wrapping_add((row * self.l) as u32);
            emission.row_parity = Some(self.build_parity(&packets, FecKind::Row, row_snbase, self.l as u8, 1));
        }

        if self.filled == self.l * self.d {
            let computed: Vec<Bytes> = (0..self.l)
                .map(|c| {
                    let packets = self.col_packets(c);
                    let col_snbase = self.block_base_seq.wrapping_add(c as u32);
                    self.build_parity(&packets, FecKind::Column, col_snbase, self.d as u8, self.l as u8)
                })
                .collect();

            self.pending_column_parity.extend(computed);
            self.reset_block(self.block_base_seq.wrapping_add((self.l * self.d) as u32));
        }

        if let Some(parity) = self.pending_column_parity.pop_front() {
            emission.column_parity.push(parity);
        }

        emission
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media_packet(seq: u16, ts: u32, payload: &[u8]) -> Bytes {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0x80, 33]);
        buf.extend_from_slice(&seq.to_be_bytes());
        buf.extend_from_slice(&ts.to_be_bytes());
        buf.extend_from_slice(&[0, 0, 0, 1]);
        buf.extend_from_slice(payload);
        buf.freeze()
    }

    #[test]
    fn row_parity_emitted_once_per_complete_row() {
        let mut matrix = Cop3Matrix::new(3, 2);
        let mut emissions = Vec::new();
        for seq in 0u16..6 {
            emissions.push(matrix.push(media_packet(seq, seq as u32 * 3000, &[seq as u8; 4]), seq));
        }
        let row_parities: Vec<_> = emissions.iter().filter(|e| e.row_parity.is_some()).collect();
        assert_eq!(row_parities.len(), 2);
    }

    #[test]
    fn column_parity_never_bursts_at_block_completion() {
        let mut matrix = Cop3Matrix::new(3, 2);
        let mut last = Cop3Emission::default();
        for seq in 0u16..6 {
            last = matrix.push(media_packet(seq, seq as u32 * 3000, &[seq as u8; 4]), seq);
        }
        // the packet that completes the matrix emits at most the one
        // trickled parity left over from the prior (empty, here) block,
        // never all `L` column parities at once.
        assert!(last.column_parity.len() <= 1);
    }

    #[test]
    fn column_parity_trickles_one_per_push_across_next_block() {
        let mut matrix = Cop3Matrix::new(3, 2);
        let mut spread_counts = Vec::new();
        for seq in 0u16..12 {
            let emission = matrix.push(media_packet(seq, seq as u32 * 3000, &[seq as u8; 4]), seq);
            spread_counts.push(emission.column_parity.len());
        }
        // first block (indices 0..6) bursts nothing; parities trickle out
        // one at a time across the following block's pushes instead.
        assert_eq!(spread_counts[..5].iter().sum::<usize>(), 0);
        assert!(spread_counts[6..].iter().sum::<usize>() >= 3);
    }
}
