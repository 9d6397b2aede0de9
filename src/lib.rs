pub mod devices;
pub mod err;
pub mod irq;
pub mod link;
pub mod mems;
pub mod peer;
pub mod protocol;
pub mod stub;

pub use devices::*;
pub use err::*;
pub use irq::*;
pub use link::*;
pub use mems::*;
pub use protocol::*;
pub use stub::*;
