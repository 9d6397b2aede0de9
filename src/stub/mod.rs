//! The MMIO stub: a register window whose accesses are answered by a peer process.
//!
//! Two links connect the stub to its peer. Link A (forward) carries window
//! accesses out and their answers back. Link B (reverse) carries the peer's own
//! READ, WRITE and IRQ requests in, served by a background listener thread.
//! The two paths share nothing but the address space and the interrupt line.

pub mod config;
pub mod forward;
pub mod listener;

pub use config::*;
pub use forward::*;
pub use listener::*;

use crate::devices::MmioDevice;
use crate::err::{LinkRole, MmioError, ProxyError};
use crate::irq::InterruptLine;
use crate::link::Link;
use crate::mems::AddressSpace;
use crate::protocol::AccessWidth;

pub struct MmioStub<L: Link> {
    config: StubConfig,
    forward: ForwardBridge<L>,
    listener: ListenerHandle,
    // Second handle onto link B so the owner can close it under the listener.
    reverse: L,
}

/// Collects the platform capabilities the stub needs before it can start.
pub struct StubBuilder<L, A, I> {
    config: StubConfig,
    memory: A,
    irq: I,
    forward: Option<L>,
    reverse: Option<L>,
}

impl<L, A, I> StubBuilder<L, A, I>
where
    L: Link,
    A: AddressSpace + 'static,
    I: InterruptLine + 'static,
{
    pub fn new(config: StubConfig, memory: A, irq: I) -> Self {
        Self {
            config,
            memory,
            irq,
            forward: None,
            reverse: None,
        }
    }

    pub fn forward_link(mut self, link: L) -> Self {
        self.forward = Some(link);
        self
    }

    pub fn reverse_link(mut self, link: L) -> Self {
        self.reverse = Some(link);
        self
    }

    /// Greet the peer on link A and start serving link B.
    ///
    /// Fails if either link is missing; there is no degraded mode.
    pub fn build(self) -> Result<MmioStub<L>, ProxyError> {
        let forward = self.forward.ok_or(ProxyError::MissingLink(LinkRole::Forward))?;
        let forward = ForwardBridge::new(forward);
        forward.hello()?;

        let reverse = self.reverse.ok_or(ProxyError::MissingLink(LinkRole::Reverse))?;
        let closer = reverse.try_clone_link()?;
        let listener = ReverseListener::new(
            reverse,
            self.memory,
            self.irq,
            self.config.read_failure,
        );
        let listener = ListenerHandle::spawn(&self.config.listener_name, listener)?;

        log::info!(
            "{}: window of {:#x} bytes, reverse listener '{}' started",
            self.config.name,
            self.config.window_size,
            self.config.listener_name
        );

        Ok(MmioStub {
            config: self.config,
            forward,
            listener,
            reverse: closer,
        })
    }
}

impl<L: Link> MmioStub<L> {
    pub fn config(&self) -> &StubConfig {
        &self.config
    }

    pub fn forward(&self) -> &ForwardBridge<L> {
        &self.forward
    }

    pub fn listener(&mut self) -> &mut ListenerHandle {
        &mut self.listener
    }

    /// Close link B and wait for the listener to stop.
    pub fn shutdown(&mut self) -> Option<&ProxyError> {
        if let Err(e) = self.reverse.shutdown() {
            log::warn!("{}: closing reverse link: {e}", self.config.name);
        }
        self.listener.wait_closed()
    }
}

fn access_width(size: usize) -> Result<AccessWidth, MmioError> {
    AccessWidth::try_from(size).map_err(|_| MmioError::InvalidSize { size })
}

impl<L: Link> MmioDevice for MmioStub<L> {
    fn read(&mut self, offset: u64, size: usize) -> Result<u64, MmioError> {
        let width = access_width(size)?;
        Ok(self.forward.read(offset, width)?)
    }

    fn write(&mut self, offset: u64, size: usize, value: u64) -> Result<(), MmioError> {
        let width = access_width(size)?;
        let ok = self.forward.write(offset, width, value)?;
        if !ok && self.config.write_failure == WriteFailurePolicy::Fault {
            return Err(MmioError::DeviceError(format!(
                "{}: peer rejected write of {value:#x} at offset {offset:#x}",
                self.config.name
            )));
        }
        Ok(())
    }

    fn reset(&mut self) {
        // All register state lives in the peer.
    }

    fn get_size(&self) -> u64 {
        self.config.window_size
    }
}
