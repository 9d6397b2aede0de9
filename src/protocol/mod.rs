pub mod codec;
pub mod message;

pub use codec::*;
pub use message::*;
