//! The input-adapter contract (spec.md §6): `probe()`, `open()`, and the
//! `clock_tick(pts)` call every delivered picture makes. The real capture
//! drivers (SDI cards, SMPTE 2022-6/2110 reception, the color-bar
//! generator) are out of scope (spec.md §1); this module only defines the
//! seam. See `crate::synthetic` for the stand-in implementation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use obe_core::clock::ClockBus;
use obe_core::descriptor::StreamType;
use obe_core::frame::RawFrame;
use obe_core::queue::Queue;
use obe_core::status::InputStatus;

/// One stream as `probe()` detects it (spec.md §6: "returns detected
/// streams (format, dimensions, timebase, SAR, channel layout, language,
/// subtitle type, teletext page)").
#[derive(Debug, Clone)]
pub struct DetectedStream {
    pub input_stream_id: u32,
    pub stream_type: StreamType,
    pub width: u32,
    pub height: u32,
    pub timebase_num: u32,
    pub timebase_den: u32,
    pub sar_num: u32,
    pub sar_den: u32,
    pub num_channels: u32,
    pub language: String,
}

/// `program_descriptor`, the return value of `probe()` (spec.md §6).
#[derive(Debug, Clone, Default)]
pub struct ProgramDescriptor {
    pub streams: Vec<DetectedStream>,
}

/// Everything an `InputAdapter` needs to deliver frames into the running
/// pipeline: the clock bus to tick, one queue per detected stream (same
/// order as `ProgramDescriptor::streams`), the input-activity status
/// (spec.md §4.9: "On >= 1.5s without a frame, raises an inactive
/// status"), and the global drop flag the adapter sets on a detected
/// discontinuity (spec.md §4.9: "non-monotonic PTS, signal loss").
pub struct InputSink {
    pub clock: Arc<ClockBus>,
    pub stream_queues: Vec<Arc<Queue<RawFrame>>>,
    pub status: Arc<InputStatus>,
    pub drop_flag: Arc<AtomicBool>,
}

impl InputSink {
    /// Delivers one frame to its stream's queue and ticks the clock bus
    /// (spec.md §6: "`clock_tick(pts)` — called on each picture before
    /// frame delivery"). Only picture frames drive the clock; audio and
    /// ancillary frames are timestamped against it but don't advance it.
    pub fn deliver(&self, stream_index: usize, frame: RawFrame, drives_clock: bool) {
        if drives_clock {
            self.clock.tick(frame.pts);
        }
        self.status.note_frame(frame.pts / (obe_core::clock::OBE_CLOCK / 1000));
        if let Some(queue) = self.stream_queues.get(stream_index) {
            queue.push(frame);
        }
    }

    pub fn signal_discontinuity(&self) {
        self.drop_flag.store(true, Ordering::Release);
    }
}

/// The contract every capture driver or network receiver implements
/// (spec.md §6). `open` takes ownership and blocks for the adapter's
/// lifetime — `obe-engine::Engine` runs it on its own thread.
pub trait InputAdapter: Send + 'static {
    fn probe(&self) -> ProgramDescriptor;

    /// Starts producing frames into `sink`, blocking until the engine
    /// cancels the adapter's stream queues.
    fn open(self: Box<Self>, sink: InputSink);
}
