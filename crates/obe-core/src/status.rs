//! Reusable pieces of the status surface (spec.md §7: "a status object
//! exposing `{input_active, detected_video_format, per_output ARQ
//! depth}`"). `obe-engine::status` owns the aggregate; these are the
//! per-component facts each stage can report independently, so a stage
//! crate never needs to depend on `obe-engine`.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

/// Whether the input has produced a frame recently (spec.md §4.9: "On
/// >= 1.5 s without a frame, raises an inactive status").
#[derive(Debug)]
pub struct InputStatus {
    active: AtomicBool,
    last_frame_wall_ms: AtomicI64,
}

impl Default for InputStatus {
    fn default() -> Self {
        InputStatus { active: AtomicBool::new(false), last_frame_wall_ms: AtomicI64::new(0) }
    }
}

impl InputStatus {
    pub const INACTIVE_THRESHOLD_MS: i64 = 1500;

    pub fn note_frame(&self, wall_ms: i64) {
        self.active.store(true, Ordering::Release);
        self.last_frame_wall_ms.store(wall_ms, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Re-evaluates activity given the current wall clock; called
    /// periodically rather than only on frame arrival, since "no frame
    /// for 1.5s" is itself the event.
    pub fn refresh(&self, now_wall_ms: i64) -> bool {
        let last = self.last_frame_wall_ms.load(Ordering::Acquire);
        let active = last != 0 && now_wall_ms - last < Self::INACTIVE_THRESHOLD_MS;
        self.active.store(active, Ordering::Release);
        active
    }
}

/// Encoder readiness + per-output packet/octet counters (SPEC_FULL.md §B.3:
/// the original's `is_ready`, `pkt_cnt`, `octet_cnt`).
#[derive(Debug, Default)]
pub struct EncoderStatus {
    ready: AtomicBool,
    vbv_buffer_size_27mhz: AtomicI64,
    vbv_init_fill_27mhz: AtomicI64,
}

impl EncoderStatus {
    pub fn mark_ready(&self, vbv_buffer_size_27mhz: i64, vbv_init_fill_27mhz: i64) {
        self.vbv_buffer_size_27mhz.store(vbv_buffer_size_27mhz, Ordering::Release);
        self.vbv_init_fill_27mhz.store(vbv_init_fill_27mhz, Ordering::Release);
        self.ready.store(true, Ordering::Release);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn vbv_buffer_size_27mhz(&self) -> i64 {
        self.vbv_buffer_size_27mhz.load(Ordering::Acquire)
    }

    pub fn vbv_init_fill_27mhz(&self) -> i64 {
        self.vbv_init_fill_27mhz.load(Ordering::Acquire)
    }
}

/// Per-output counters, including ARQ retransmission-cache depth.
#[derive(Debug, Default)]
pub struct OutputStatus {
    pub pkt_cnt: AtomicU64,
    pub octet_cnt: AtomicU64,
    pub arq_depth: AtomicU64,
    pub arq_retransmits: AtomicU64,
}

impl OutputStatus {
    pub fn note_sent(&self, octets: usize) {
        self.pkt_cnt.fetch_add(1, Ordering::Relaxed);
        self.octet_cnt.fetch_add(octets as u64, Ordering::Relaxed);
    }

    pub fn set_arq_depth(&self, depth: usize) {
        self.arq_depth.store(depth as u64, Ordering::Relaxed);
    }

    pub fn note_retransmit(&self) {
        self.arq_retransmits.fetch_add(1, Ordering::Relaxed);
    }
}
