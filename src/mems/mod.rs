// Guest physical memory.
//
// The stub never owns RAM. The platform hands it an address space capability,
// and the reverse listener uses that to service peer READ/WRITE requests.
// Every access goes through `AddressSpace`, so one request is one transaction.
pub mod error;
pub mod shared;

pub use error::*;
pub use shared::*;
