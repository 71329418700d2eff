//! The per-output worker (spec.md §4.8): reads `buf_ref` batches off its
//! queue and, per the output descriptor, wraps them in RTP, optionally
//! protects them with ProMPEG COP3 or FECFRAME LDPC-Staircase FEC,
//! optionally duplicates them, and sends. A companion thread services
//! RTCP feedback when ARQ is configured.

use std::net::UdpSocket;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;

use obe_core::clock::ClockBus;
use obe_core::descriptor::{FecType, OutputDescriptor, OutputType};
use obe_core::muxed::BufRef;
use obe_core::queue::Queue;
use obe_core::status::OutputStatus;

use crate::arq::{parse_rtcp, ArqAction, ArqSession};
use crate::fec::cop3::Cop3Matrix;
use crate::fec::ldpc::LdpcBlock;
use crate::rtp::{pcr_to_rtp_timestamp, RtpSession, PT_FEC, PT_MP2T};
use crate::socket::open_output_socket;

enum FecEncoder {
    Cop3 { matrix: Cop3Matrix, column_socket: UdpSocket, row_socket: UdpSocket, fec_rtp: RtpSession },
    Ldpc { block: LdpcBlock },
}

pub struct OutputWorker {
    input: Arc<Queue<BufRef>>,
    descriptor: OutputDescriptor,
    media_socket: UdpSocket,
    rtp: RtpSession,
    fec: Option<FecEncoder>,
    arq: Option<Arc<Mutex<ArqSession>>>,
    rtcp_socket: Option<UdpSocket>,
    status: Arc<OutputStatus>,
    clock: Arc<ClockBus>,
}

impl OutputWorker {
    pub fn new(input: Arc<Queue<BufRef>>, descriptor: OutputDescriptor, status: Arc<OutputStatus>, clock: Arc<ClockBus>) -> std::io::Result<Self> {
        let media_socket = open_output_socket(&descriptor, 0).map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
        media_socket.set_read_timeout(None)?;

        // FEC and ARQ are RTP-layer features (spec.md §4.8.2-§4.8.5 all
        // build on the 12-byte RTP header); plain UDP outputs (§4.8.1)
        // never construct them, matching the bypass in `run()`.
        let fec = match if descriptor.output_type == OutputType::Rtp { descriptor.fec_type } else { FecType::None } {
            FecType::None => None,
            FecType::Cop3BlockAligned | FecType::Cop3NonBlockAligned => {
                let column_socket = open_output_socket(&descriptor, 2).map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
                let row_socket = open_output_socket(&descriptor, 4).map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
                Some(FecEncoder::Cop3 {
                    matrix: Cop3Matrix::new(descriptor.fec_columns.max(1) as usize, descriptor.fec_rows.max(1) as usize),
                    column_socket,
                    row_socket,
                    fec_rtp: RtpSession::new(),
                })
            }
            FecType::FecframeLdpcStaircase => {
                let k = (descriptor.fec_columns.max(1) * descriptor.fec_rows.max(1)) as usize;
                let r = descriptor.fec_rows.max(1) as usize;
                Some(FecEncoder::Ldpc { block: LdpcBlock::new(k, r) })
            }
        };

        let (arq, rtcp_socket) = if descriptor.output_type == OutputType::Rtp && descriptor.arq_latency_ms > 0 {
            let rtcp_socket = open_output_socket(&descriptor, 1).map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
            rtcp_socket.set_read_timeout(Some(Duration::from_millis(200)))?;
            (Some(Arc::new(Mutex::new(ArqSession::new(descriptor.arq_latency_ms)))), Some(rtcp_socket))
        } else {
            (None, None)
        };

        Ok(OutputWorker { input, descriptor, media_socket, rtp: RtpSession::new(), fec, arq, rtcp_socket, status, clock })
    }

    pub fn spawn(mut self) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        if let (Some(arq), Some(rtcp_socket)) = (self.arq.clone(), self.rtcp_socket.take()) {
            let ssrc = self.rtp.ssrc();
            handles.push(
                thread::Builder::new()
                    .name("obe-output-rtcp".into())
                    .spawn(move || Self::run_rtcp(rtcp_socket, arq, ssrc))
                    .expect("failed to spawn RTCP feedback thread"),
            );
        }

        handles.push(
            thread::Builder::new()
                .name("obe-output".into())
                .spawn(move || self.run())
                .expect("failed to spawn output thread"),
        );
        handles
    }

    fn run_rtcp(socket: UdpSocket, arq: Arc<Mutex<ArqSession>>, ssrc: u32) {
        let mut buf = [0u8; 1500];
        loop {
            match socket.recv(&mut buf) {
                Ok(len) => {
                    let now = 0; // RTCP-driven RTT is logged, not fed back into the media clock.
                    let events = parse_rtcp(&buf[..len]);
                    for event in &events {
                        let mut session = arq.lock();
                        match session.handle_event(event, now) {
                            ArqAction::SendXrDlrr { lrr } => {
                                let response = crate::arq::build_xr_dlrr(ssrc, lrr);
                                let _ = socket.send(&response);
                            }
                            ArqAction::RttEstimated(rtt_ms) => {
                                log::debug!("obe-output: RTCP RTT estimate {rtt_ms} ms");
                            }
                            ArqAction::Retransmit(packets) => {
                                for packet in packets {
                                    let _ = socket.send(&packet);
                                }
                            }
                            ArqAction::None => {}
                        }
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut => continue,
                Err(e) => {
                    log::warn!("obe-output: RTCP socket error, exiting feedback thread: {e}");
                    return;
                }
            }
        }
    }

    fn send_with_duplication(socket: &UdpSocket, payload: &Bytes, dup_delay_us: u64) {
        if let Err(e) = socket.send(payload) {
            log::warn!("obe-output: send failed: {e}");
            return;
        }
        if dup_delay_us > 0 {
            if let Ok(dup_socket) = socket.try_clone() {
                let dup_payload = payload.clone();
                thread::spawn(move || {
                    thread::sleep(Duration::from_micros(dup_delay_us));
                    let _ = dup_socket.send(&dup_payload);
                });
            }
        }
    }

    fn run(mut self) {
        loop {
            let batches = self.input.wait_and_drain_all();
            if batches.is_empty() && self.input.is_cancelled() {
                log::info!("obe-output: input cancelled, exiting");
                return;
            }

            for buf_ref in batches {
                if self.descriptor.output_type == OutputType::Udp {
                    // spec.md §4.8.1: plain UDP sends the raw TS payload,
                    // no RTP header — FEC/ARQ are RTP-only features and
                    // are not reachable for this output type (see
                    // `OutputWorker::new`, which only builds them when
                    // `output_type == Rtp`).
                    Self::send_with_duplication(&self.media_socket, &buf_ref.packets, self.descriptor.dup_delay_us);
                    self.status.note_sent(buf_ref.packets.len());
                    continue;
                }

                let timestamp = pcr_to_rtp_timestamp(buf_ref.pcr_for(0));
                let packet = self.rtp.build_packet(PT_MP2T, timestamp, &buf_ref.packets);
                let seq = u16::from_be_bytes([packet[2], packet[3]]);

                if let Some(arq) = &self.arq {
                    arq.lock().note_sent(seq, packet.clone(), self.clock.get_input_clock());
                }

                match &mut self.fec {
                    Some(FecEncoder::Cop3 { matrix, column_socket, row_socket, fec_rtp }) => {
                        let emission = matrix.push(packet.clone(), seq);
                        Self::send_with_duplication(&self.media_socket, &packet, self.descriptor.dup_delay_us);
                        self.status.note_sent(packet.len());
                        if let Some(row_parity) = emission.row_parity {
                            let wrapped = fec_rtp.build_packet(PT_FEC, timestamp, &row_parity);
                            let _ = row_socket.send(&wrapped);
                        }
                        for column_parity in emission.column_parity {
                            let wrapped = fec_rtp.build_packet(PT_FEC, timestamp, &column_parity);
                            let _ = column_socket.send(&wrapped);
                        }
                    }
                    Some(FecEncoder::Ldpc { block }) => {
                        if let Some(sequence) = block.push(packet.clone()) {
                            for adu in sequence {
                                Self::send_with_duplication(&self.media_socket, &adu, self.descriptor.dup_delay_us);
                                self.status.note_sent(adu.len());
                            }
                        } else {
                            Self::send_with_duplication(&self.media_socket, &packet, self.descriptor.dup_delay_us);
                            self.status.note_sent(packet.len());
                        }
                    }
                    None => {
                        Self::send_with_duplication(&self.media_socket, &packet, self.descriptor.dup_delay_us);
                        self.status.note_sent(packet.len());
                    }
                }

                if let Some(arq) = &self.arq {
                    self.status.set_arq_depth(arq.lock().depth());
                }
            }
        }
    }
}
