pub mod mmio;
pub mod register;
pub mod scratch;

pub use mmio::*;
