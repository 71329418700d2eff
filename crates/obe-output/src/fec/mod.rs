pub mod cop3;
pub mod header;
pub mod ldpc;

pub use cop3::{Cop3Emission, Cop3Matrix};
pub use header::FecHeader;
pub use ldpc::LdpcBlock;
