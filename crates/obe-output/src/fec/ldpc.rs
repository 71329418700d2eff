//! FECFRAME LDPC-Staircase (RFC 5170), spec.md §4.8.4: a block of `k`
//! source symbols (ADUs) plus `r` repair symbols of equal length. Each
//! ADU is `{3-byte ADU header || RTP packet || 6-byte ADU footer}`; the
//! repair symbols use the staircase generator structure (each repair
//! symbol XORs a stride of source symbols plus the previous repair
//! symbol), then repair packets are interleaved back into the source
//! sequence at a stride of `k/r`.

use bytes::{BufMut, Bytes, BytesMut};

const ADU_HEADER_LEN: usize = 3;
const ADU_FOOTER_LEN: usize = 6;

fn wrap_adu(seq: u32, is_repair: bool, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(ADU_HEADER_LEN + payload.len() + ADU_FOOTER_LEN);
    buf.put_u16(payload.len() as u16);
    buf.put_u8(if is_repair { 0x01 } else { 0x00 });
    buf.extend_from_slice(payload);
    buf.put_u32(seq);
    buf.put_u16(0); // flow id, single-flow in this workspace
    buf.freeze()
}

fn xor_into(accum: &mut [u8], data: &[u8]) {
    for (i, byte) in data.iter().enumerate() {
        if i < accum.len() {
            accum[i] ^= byte;
        }
    }
}

pub struct LdpcBlock {
    k: usize,
    r: usize,
    source: Vec<Bytes>,
    next_seq: u32,
}

impl LdpcBlock {
    pub fn new(k: usize, r: usize) -> Self {
        assert!(k > 0 && r > 0, "LDPC block needs at least one source and one repair symbol");
        LdpcBlock { k, r, source: Vec::with_capacity(k), next_seq: 0 }
    }

    /// Pushes one RTP packet as the next ADU in the block. Returns the
    /// full interleaved send sequence (source ADUs plus repair ADUs
    /// spread at a stride of `k/r`) once the block of `k` fills, else
    /// `None`.
    pub fn push(&mut self, rtp_packet: Bytes) -> Option<Vec<Bytes>> {
        let adu = wrap_adu(self.next_seq, false, &rtp_packet);
        self.next_seq = self.next_seq.wrapping_add(1);
        self.source.push(adu);

        if self.source.len() < self.k {
            return None;
        }

        let symbol_len = self.source.iter().map(|s| s.len()).max().unwrap_or(0);
        let stride = (self.k / self.r).max(1);

        let mut repair_symbols: Vec<Vec<u8>> = vec![vec![0u8; symbol_len]; self.r];
        for (j, adu) in self.source.iter().enumerate() {
            let i = j % self.r;
            xor_into(&mut repair_symbols[i], adu);
        }
        // staircase: each repair symbol also folds in the previous one.
        for i in 1..self.r {
            let (left, right) = repair_symbols.split_at_mut(i);
            xor_into(&mut right[0], &left[i - 1]);
        }

        let repair_adus: Vec<Bytes> = repair_symbols
            .into_iter()
            .enumerate()
            .map(|(i, symbol)| wrap_adu(self.next_seq.wrapping_add(i as u32), true, &symbol))
            .collect();

        let mut sequence = Vec::with_capacity(self.k + self.r);
        let mut repair_iter = repair_adus.into_iter();
        for (idx, adu) in self.source.drain(..).enumerate() {
            sequence.push(adu);
            if (idx + 1) % stride == 0 {
                if let Some(repair) = repair_iter.next() {
                    sequence.push(repair);
                }
            }
        }
        sequence.extend(repair_iter);

        Some(sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_completes_after_k_pushes() {
        let mut block = LdpcBlock::new(4, 2);
        let mut out = None;
        for i in 0..4u8 {
            out = block.push(Bytes::copy_from_slice(&[i; 10]));
        }
        let sequence = out.expect("block of 4 completes");
        assert_eq!(sequence.len(), 6);
    }

    #[test]
    fn repair_packets_are_spread_not_trailing() {
        let mut block = LdpcBlock::new(4, 2);
        let mut out = None;
        for i in 0..4u8 {
            out = block.push(Bytes::copy_from_slice(&[i; 5]));
        }
        let sequence = out.unwrap();
        // stride = 4/2 = 2: repair packets land after source[1] and source[3],
        // not bunched at the very end.
        assert_eq!(sequence[2][2], 0x01); // is_repair flag byte of first interleaved repair
        assert_ne!(sequence[5][2], 0x00);
    }
}
