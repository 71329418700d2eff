//! SMPTE 337M / S302M passthrough (spec.md §4.3 "S302M passthrough"):
//! scanning interleaved 16-bit PCM words for a 337M sync burst and
//! extracting the encapsulated compressed payload (AC-3 is the only
//! supported case, per the spec).
//!
//! 337M frames a compressed bitstream inside otherwise-PCM audio so it
//! survives an AES3/SDI audio path unmodified; the two sync words mark
//! where a burst starts and how long the burst's payload is.

use bytes::Bytes;

/// SMPTE 337M preamble sync words (Pa, Pb), transmitted as two 16-bit
/// words before each compressed-data burst.
pub const SYNC_WORD_A: u16 = 0xF872;
pub const SYNC_WORD_B: u16 = 0x4E1F;

/// `data_type` field (Pc, low 7 bits) identifying AC-3 inside the burst
/// (SMPTE 337M table 1: `0x01` = AC-3).
pub const DATA_TYPE_AC3: u16 = 0x01;

/// One decoded 337M burst: the data-type code and the extracted payload
/// bytes (the encapsulated AC-3 frame), independent of how many 16-bit
/// PCM words it occupied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Smpte337Burst {
    pub data_type: u16,
    pub payload: Bytes,
}

/// Scans one channel's interleaved 16-bit PCM word stream for 337M
/// bursts. Returns every complete burst found; a burst whose declared
/// length runs past the end of `words` is left for the next call (the
/// caller is expected to accumulate across audio windows, spec.md §4.3:
/// "accumulate `frames_per_pes` bursts").
pub fn scan_337m_bursts(words: &[u16]) -> (Vec<Smpte337Burst>, usize) {
    let mut bursts = Vec::new();
    let mut i = 0usize;
    while i + 3 < words.len() {
        if words[i] == SYNC_WORD_A && words[i + 1] == SYNC_WORD_B {
            let pc = words[i + 2];
            let data_type = pc & 0x7F;
            // Pd: burst payload length in *bits*, per SMPTE 337M.
            let length_bits = words[i + 3] as usize;
            let length_words = (length_bits + 15) / 16;
            let burst_start = i + 4;
            let burst_end = burst_start + length_words;
            if burst_end > words.len() {
                // Incomplete burst: stop here, let the caller re-scan
                // once more samples have arrived.
                return (bursts, i);
            }
            let mut payload = Vec::with_capacity(length_words * 2);
            for &w in &words[burst_start..burst_end] {
                payload.extend_from_slice(&w.to_be_bytes());
            }
            payload.truncate((length_bits + 7) / 8);
            bursts.push(Smpte337Burst { data_type, payload: Bytes::from(payload) });
            i = burst_end;
        } else {
            i += 1;
        }
    }
    (bursts, i)
}

/// Accumulates decoded AC-3 337M bursts until `frames_per_pes` have been
/// collected, then hands back one concatenated payload stamped with a PTS
/// interpolated from the sample offset of the *first* burst in the group
/// (spec.md §4.3: "a PTS interpolated from the sample offset within the
/// audio window").
pub struct PassthroughAccumulator {
    frames_per_pes: usize,
    pending: Vec<Smpte337Burst>,
}

impl PassthroughAccumulator {
    pub fn new(frames_per_pes: usize) -> Self {
        PassthroughAccumulator { frames_per_pes, pending: Vec::new() }
    }

    /// Feeds one window's worth of decoded bursts (already filtered to
    /// `DATA_TYPE_AC3` by the caller). Returns `Some(concatenated bytes)`
    /// once `frames_per_pes` bursts have accumulated.
    pub fn feed(&mut self, bursts: impl IntoIterator<Item = Smpte337Burst>) -> Option<Bytes> {
        self.pending.extend(bursts);
        if self.pending.len() >= self.frames_per_pes {
            let ready: Vec<_> = self.pending.drain(..self.frames_per_pes).collect();
            let mut out = Vec::new();
            for burst in ready {
                out.extend_from_slice(&burst.payload);
            }
            Some(Bytes::from(out))
        } else {
            None
        }
    }

    /// Interpolated PTS for a burst found at `sample_offset` within an
    /// audio window beginning at `window_pts` (27 MHz ticks), at
    /// `sample_rate` Hz.
    pub fn interpolate_pts(window_pts: i64, sample_offset: u32, sample_rate: u32) -> i64 {
        window_pts + (sample_offset as i64 * obe_core::clock::OBE_CLOCK) / sample_rate as i64
    }
}

/// Helper for tests and callers assembling a synthetic capture: builds a
/// 337M burst of `payload`, data-type `data_type`, as a 16-bit word
/// stream suitable for feeding straight into [`scan_337m_bursts`].
pub fn build_337m_burst(data_type: u16, payload: &[u8]) -> Vec<u16> {
    let length_bits = payload.len() * 8;
    let mut words = vec![SYNC_WORD_A, SYNC_WORD_B, data_type & 0x7F, length_bits as u16];
    let mut padded = payload.to_vec();
    if padded.len() % 2 != 0 {
        padded.push(0);
    }
    for chunk in padded.chunks_exact(2) {
        words.push(u16::from_be_bytes([chunk[0], chunk[1]]));
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_finds_single_ac3_burst() {
        let payload = vec![0xAAu8; 10];
        let words = build_337m_burst(DATA_TYPE_AC3, &payload);
        let (bursts, consumed) = scan_337m_bursts(&words);
        assert_eq!(bursts.len(), 1);
        assert_eq!(bursts[0].data_type, DATA_TYPE_AC3);
        assert_eq!(bursts[0].payload.as_ref(), payload.as_slice());
        assert_eq!(consumed, words.len());
    }

    #[test]
    fn incomplete_burst_is_not_consumed() {
        let payload = vec![0xAAu8; 10];
        let mut words = build_337m_burst(DATA_TYPE_AC3, &payload);
        words.truncate(words.len() - 1);
        let (bursts, _consumed) = scan_337m_bursts(&words);
        assert!(bursts.is_empty());
    }

    #[test]
    fn accumulator_emits_after_frames_per_pes() {
        let mut acc = PassthroughAccumulator::new(2);
        let b = Smpte337Burst { data_type: DATA_TYPE_AC3, payload: Bytes::from_static(b"abc") };
        assert!(acc.feed(vec![b.clone()]).is_none());
        let out = acc.feed(vec![b]).unwrap();
        assert_eq!(out.as_ref(), b"abcabc");
    }
}
