//! Data model and infrastructure shared by every stage of the OBE pipeline:
//! the frame types that flow between workers, the bounded FIFO queue that
//! connects them, the 27 MHz clock bus, and the stream/output descriptors
//! that configuration is expressed in.
//!
//! Nothing in this crate spawns a thread or opens a socket — it is the
//! vocabulary the other crates share.

pub mod clock;
pub mod coded;
pub mod descriptor;
pub mod error;
pub mod frame;
pub mod muxed;
pub mod queue;
pub mod status;
pub mod timecode;

pub use clock::{ClockBus, OBE_CLOCK};
pub use coded::CodedFrame;
pub use descriptor::{OutputDescriptor, StreamDescriptor};
pub use error::Error;
pub use frame::RawFrame;
pub use muxed::{BufRef, MuxedData, TS_PACKETS_SIZE};
pub use queue::Queue;
pub use timecode::Timecode;
