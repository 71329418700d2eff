//! Assembles the filter, encode, mux, and IP output stage crates into a
//! running pipeline (spec.md §5, §6): `EngineConfig`, the input-adapter
//! contract, the `Engine` handle, and the polled status surface.

pub mod config;
pub mod engine;
pub mod error;
pub mod input;
pub mod status;
pub mod synthetic;

pub use config::{EngineConfig, VideoFormat};
pub use engine::Engine;
pub use error::EngineError;
pub use input::{DetectedStream, InputAdapter, InputSink, ProgramDescriptor};
pub use status::{EngineStatus, EngineStatusSnapshot, OutputStatusSnapshot};
pub use synthetic::SyntheticInput;
