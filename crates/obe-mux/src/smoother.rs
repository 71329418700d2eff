//! The mux-output smoother (spec.md §4.7): paces `TS_PACKETS_SIZE`
//! batches to IP outputs in wall-clock time anchored to PCR, the same
//! anchor-and-sleep shape as the encoder-output smoother (spec.md §4.5)
//! but keyed on PCR delta instead of DTS delta.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bytes::BytesMut;

use obe_core::clock::ClockBus;
use obe_core::muxed::{BufRef, MuxedData, TS_PACKETS_SIZE};
use obe_core::queue::Queue;

struct Anchor {
    start_mpeg_time: i64,
    start_pcr: i64,
}

/// Maintains a data-byte FIFO and a parallel per-packet PCR FIFO, drains
/// both in exact `TS_PACKETS_SIZE` batches (spec.md §4.7: `7 * 188`
/// bytes, the canonical RTP/UDP payload size), and releases each batch
/// paced to wall-clock time anchored on the batch's first PCR value.
///
/// Like the encoder-output smoother (spec.md §4.5), pacing doesn't start
/// until one VBV's worth of PCR span has accumulated (spec.md §4.7:
/// "same anchor-and-sleep algorithm as §4.5... keyed on PCR delta").
pub struct MuxOutputSmoother {
    input: Arc<Queue<MuxedData>>,
    output: Arc<Queue<BufRef>>,
    clock: Arc<ClockBus>,
    temporal_vbv_size: i64,
    drop_flag: Arc<AtomicBool>,
}

impl MuxOutputSmoother {
    pub fn new(input: Arc<Queue<MuxedData>>, output: Arc<Queue<BufRef>>, clock: Arc<ClockBus>, temporal_vbv_size: i64, drop_flag: Arc<AtomicBool>) -> Self {
        MuxOutputSmoother { input, output, clock, temporal_vbv_size, drop_flag }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        thread::Builder::new()
            .name("obe-mux-smoother".into())
            .spawn(move || self.run())
            .expect("failed to spawn mux-output smoother thread")
    }

    fn run(self) {
        let mut pending_bytes = BytesMut::new();
        let mut pending_pcr: VecDeque<i64> = VecDeque::new();
        let mut anchor: Option<Anchor> = None;
        let mut buffer_complete = false;

        loop {
            let muxed = match self.input.pop() {
                Some(m) => m,
                None => {
                    log::info!("obe-mux: mux-output smoother input cancelled, exiting");
                    self.output.cancel();
                    return;
                }
            };

            if self.drop_flag.swap(false, Ordering::AcqRel) {
                log::warn!("obe-mux: mux-output smoother re-arming after drop signal");
                anchor = None;
                buffer_complete = false;
                pending_bytes.clear();
                pending_pcr.clear();
            }

            pending_bytes.extend_from_slice(&muxed.packets);
            pending_pcr.extend(muxed.pcr.iter().copied());

            if !buffer_complete {
                if let (Some(&earliest), Some(&latest)) = (pending_pcr.front(), pending_pcr.back()) {
                    if latest - earliest >= self.temporal_vbv_size {
                        buffer_complete = true;
                    }
                }
            }

            if !buffer_complete {
                continue;
            }

            while pending_bytes.len() >= TS_PACKETS_SIZE {
                let chunk = pending_bytes.split_to(TS_PACKETS_SIZE).freeze();
                let chunk_pcr: Vec<i64> = pending_pcr.drain(..7).collect();
                let first_pcr = chunk_pcr[0];

                let anchor_ref = anchor.get_or_insert_with(|| Anchor { start_mpeg_time: self.clock.get_input_clock(), start_pcr: first_pcr });
                let deadline = anchor_ref.start_mpeg_time + (first_pcr - anchor_ref.start_pcr);
                self.clock.sleep_until(deadline);

                if !self.output.push(BufRef::new(chunk, chunk_pcr)) {
                    log::warn!("obe-mux: mux-output smoother output queue cancelled");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use obe_core::muxed::TS_PACKET_SIZE;

    fn muxed(packet_count: usize, first_pcr: i64) -> MuxedData {
        let packets = Bytes::from(vec![0x47u8; packet_count * TS_PACKET_SIZE]);
        let pcr = (0..packet_count).map(|i| first_pcr + i as i64 * 1000).collect();
        MuxedData { packets, pcr }
    }

    #[test]
    fn drains_in_exact_seven_packet_batches() {
        let input: Arc<Queue<MuxedData>> = Arc::new(Queue::unbounded());
        let output: Arc<Queue<BufRef>> = Arc::new(Queue::unbounded());
        let clock = Arc::new(ClockBus::new());
        clock.tick(1_000_000);
        let drop_flag = Arc::new(AtomicBool::new(false));

        input.push(muxed(14, 0));
        input.cancel();

        let smoother = MuxOutputSmoother::new(input, output.clone(), clock, 0, drop_flag);
        smoother.run();

        let mut batches = 0;
        while let Some(buf_ref) = output.pop() {
            assert_eq!(buf_ref.packet_count(), 7);
            batches += 1;
        }
        assert_eq!(batches, 2);
    }

    #[test]
    fn leftover_bytes_below_batch_size_stay_pending() {
        let input: Arc<Queue<MuxedData>> = Arc::new(Queue::unbounded());
        let output: Arc<Queue<BufRef>> = Arc::new(Queue::unbounded());
        let clock = Arc::new(ClockBus::new());
        clock.tick(1_000_000);
        let drop_flag = Arc::new(AtomicBool::new(false));

        input.push(muxed(3, 0));
        input.cancel();

        let smoother = MuxOutputSmoother::new(input, output.clone(), clock, 0, drop_flag);
        smoother.run();

        assert!(output.pop().is_none());
    }

    #[test]
    fn pacing_withheld_until_vbv_span_accumulates() {
        let input: Arc<Queue<MuxedData>> = Arc::new(Queue::unbounded());
        let output: Arc<Queue<BufRef>> = Arc::new(Queue::unbounded());
        let clock = Arc::new(ClockBus::new());
        clock.tick(1_000_000);
        let drop_flag = Arc::new(AtomicBool::new(false));

        // First batch alone is one full TS_PACKETS_SIZE chunk (7 packets)
        // but its PCR span (6000) is below the 8000-tick threshold, so it
        // must not drain yet (spec.md §4.7: buffer until one VBV span of
        // PCR is present before pacing starts).
        input.push(muxed(7, 0));
        input.push(muxed(7, 7_000));
        input.cancel();

        let smoother = MuxOutputSmoother::new(input, output.clone(), clock, 8_000, drop_flag);
        smoother.run();

        let mut batches = 0;
        while output.pop().is_some() {
            batches += 1;
        }
        assert_eq!(batches, 2);
    }
}
