//! The other end of the links: what a device-simulating peer process runs.
//!
//! [`ForwardServer`] answers window accesses arriving on link A by dispatching
//! them to an [`MmioManager`] of simulated devices. [`PeerClient`] issues the
//! peer's own requests on link B.

use crate::devices::MmioManager;
use crate::err::{LinkRole, MmioError, ProtocolError, ProxyError};
use crate::link::Link;
use crate::protocol::{
    AccessWidth, ControlMessage, Operation, read_message, read_payload, read_status,
    write_message, write_payload, write_status,
};
use crate::stub::ReadFailurePolicy;

pub struct ForwardServer<L: Link> {
    link: L,
}

impl<L: Link> ForwardServer<L> {
    pub fn new(link: L) -> Self {
        Self { link }
    }

    /// The stub greets once, right after it opens the link.
    pub fn expect_hello(&mut self) -> Result<(), ProxyError> {
        let msg = read_message(&mut self.link)?;
        if msg.op != Operation::Hello {
            return Err(ProtocolError::UnexpectedOperation {
                op: msg.op.to_string(),
                role: LinkRole::Forward,
            }
            .into());
        }
        Ok(())
    }

    pub fn serve_one(&mut self, bus: &mut MmioManager) -> Result<ControlMessage, ProxyError> {
        let msg = read_message(&mut self.link)?;
        match msg.op {
            Operation::Read => {
                let width = msg.width()?;
                let value = bus
                    .handle_read(msg.address, width.bytes())
                    .unwrap_or_else(|e| {
                        log::warn!("peer read failed: {e}");
                        0
                    });
                write_payload(&mut self.link, width, value)?;
            }
            Operation::Write => {
                let width = msg.width()?;
                let ok = match bus.handle_write(msg.address, width.bytes(), msg.value) {
                    Ok(()) => true,
                    Err(e) => {
                        log::warn!("peer write failed: {e}");
                        false
                    }
                };
                write_status(&mut self.link, ok)?;
            }
            Operation::Hello => log::debug!("stub said hello again"),
            op => log::debug!("ignoring {op} on the forward link"),
        }
        Ok(msg)
    }

    /// Serve until the stub goes away.
    pub fn serve(&mut self, bus: &mut MmioManager) -> ProxyError {
        loop {
            if let Err(e) = self.serve_one(bus) {
                return e;
            }
        }
    }
}

pub struct PeerClient<L: Link> {
    link: L,
    read_failure: ReadFailurePolicy,
}

impl<L: Link> PeerClient<L> {
    pub fn new(link: L) -> Self {
        Self {
            link,
            read_failure: ReadFailurePolicy::default(),
        }
    }

    /// Must match the stub's `StubConfig::read_failure`.
    pub fn read_failure(mut self, policy: ReadFailurePolicy) -> Self {
        self.read_failure = policy;
        self
    }

    /// Read guest memory. Failures read as zero unless the stub sends a trailing status.
    pub fn read(&mut self, address: u64, width: AccessWidth) -> Result<u64, ProxyError> {
        write_message(&mut self.link, &ControlMessage::read(address, width))?;
        let value = read_payload(&mut self.link, width)?;
        if self.read_failure == ReadFailurePolicy::TrailingStatus && !read_status(&mut self.link)? {
            return Err(MmioError::UnmappedAccess(address).into());
        }
        Ok(value)
    }

    /// Write guest memory; returns the stub's status.
    pub fn write(&mut self, address: u64, width: AccessWidth, value: u64) -> Result<bool, ProxyError> {
        write_message(&mut self.link, &ControlMessage::write(address, width, value))?;
        Ok(read_status(&mut self.link)?)
    }

    pub fn raise_irq(&mut self) -> Result<(), ProxyError> {
        write_message(&mut self.link, &ControlMessage::irq())?;
        Ok(())
    }

    pub fn nop(&mut self) -> Result<(), ProxyError> {
        write_message(&mut self.link, &ControlMessage::nop())?;
        Ok(())
    }
}
