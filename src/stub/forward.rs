use std::sync::Mutex;

use crate::err::ProxyError;
use crate::link::Link;
use crate::protocol::{AccessWidth, ControlMessage, read_payload, read_status, write_message};

/// Local side of link A.
///
/// Every window access becomes exactly one request and one blocking reply read.
/// The mutex keeps at most one request in flight even if the bus calls in from
/// several vCPU threads.
pub struct ForwardBridge<L: Link> {
    link: Mutex<L>,
}

impl<L: Link> ForwardBridge<L> {
    pub fn new(link: L) -> Self {
        Self {
            link: Mutex::new(link),
        }
    }

    /// Announce ourselves. The peer does not answer.
    pub fn hello(&self) -> Result<(), ProxyError> {
        let mut link = self.link.lock().map_err(|_| ProxyError::Poisoned)?;
        write_message(&mut *link, &ControlMessage::hello())?;
        Ok(())
    }

    pub fn read(&self, address: u64, width: AccessWidth) -> Result<u64, ProxyError> {
        log::debug!("forward read: addr = {address:#x}, len = {}", width.bytes());

        let mut link = self.link.lock().map_err(|_| ProxyError::Poisoned)?;
        write_message(&mut *link, &ControlMessage::read(address, width))?;
        let value = read_payload(&mut *link, width)?;

        log::debug!(
            "forward read ok: addr = {address:#x}, len = {}, val = {value:#x}",
            width.bytes()
        );
        Ok(value)
    }

    /// Returns the peer's status; a failure status is not an error here.
    pub fn write(&self, address: u64, width: AccessWidth, value: u64) -> Result<bool, ProxyError> {
        log::debug!(
            "forward write: addr = {address:#x}, len = {}, val = {value:#x}",
            width.bytes()
        );

        let mut link = self.link.lock().map_err(|_| ProxyError::Poisoned)?;
        write_message(&mut *link, &ControlMessage::write(address, width, value))?;
        let ok = read_status(&mut *link)?;

        if ok {
            log::debug!("forward write ok: addr = {address:#x}");
        } else {
            log::warn!(
                "forward write failed: addr = {address:#x}, len = {}, val = {value:#x}",
                width.bytes()
            );
        }
        Ok(ok)
    }
}
