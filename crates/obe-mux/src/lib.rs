//! The multiplexer stage (spec.md §4.6, §4.7): the MPEG-TS library
//! contract (PAT/PMT/PES/adaptation-field packing and CRC32), the
//! multiplexer worker that selects frames by rescaled DTS, and the
//! mux-output smoother that paces fixed-size TS packet batches to the IP
//! output stage.

pub mod crc32;
pub mod error;
pub mod mux;
pub mod smoother;
pub mod ts;

pub use error::MuxError;
pub use mux::{Multiplexer, MuxRateUpdate};
pub use smoother::MuxOutputSmoother;
pub use ts::{TsStreamConfig, TsWriter, TsWriterConfig};
