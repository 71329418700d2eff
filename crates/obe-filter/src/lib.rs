//! The filter stage (spec.md §4.3): per-stream worker(s) that color-
//! convert, dither, overlay ancillary data (captions/AFD/bar data) into
//! outgoing frames' user-data, extract VBI/teletext, split and resample
//! audio, and detect SMPTE 337M/S302M passthrough bursts.
//!
//! Nothing here opens a codec or a socket; this crate only transforms
//! `RawFrame`s and routes them to the per-encoder queues `obe-encode`
//! reads from.

pub mod ancillary;
pub mod audio;
pub mod passthrough;
pub mod vbi;
pub mod video;
pub mod worker;

pub use worker::{FilterTarget, FilterWorker};
