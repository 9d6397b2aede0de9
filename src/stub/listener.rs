use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread::JoinHandle;

use crate::err::ProxyError;
use crate::irq::InterruptLine;
use crate::link::Link;
use crate::mems::AddressSpace;
use crate::protocol::{
    AccessWidth, ControlMessage, Operation, read_message, write_payload, write_status,
};
use crate::stub::config::ReadFailurePolicy;

/// Services peer-initiated requests arriving on link B.
pub struct ReverseListener<L, A, I> {
    link: L,
    memory: A,
    irq: I,
    read_failure: ReadFailurePolicy,
}

impl<L, A, I> ReverseListener<L, A, I>
where
    L: Link,
    A: AddressSpace,
    I: InterruptLine,
{
    pub fn new(link: L, memory: A, irq: I, read_failure: ReadFailurePolicy) -> Self {
        Self {
            link,
            memory,
            irq,
            read_failure,
        }
    }

    /// Block for one request, carry it out, and send its reply if it has one.
    pub fn serve_one(&mut self) -> Result<ControlMessage, ProxyError> {
        let msg = read_message(&mut self.link)?;
        match msg.op {
            Operation::Read => {
                let width = msg.width()?;
                self.handle_read(msg.address, width)?;
            }
            Operation::Write => {
                let width = msg.width()?;
                self.handle_write(msg.address, width, msg.value)?;
            }
            Operation::Irq => {
                log::debug!("master IRQ");
                self.irq.set_level(true);
            }
            Operation::Nop | Operation::Hello | Operation::Unknown(_) => {
                log::trace!("master {}: ignored", msg.op);
            }
        }
        Ok(msg)
    }

    /// Serve until the link fails. Never returns on a healthy link.
    pub fn run(mut self) -> ProxyError {
        loop {
            if let Err(e) = self.serve_one() {
                return e;
            }
        }
    }

    fn handle_read(&mut self, address: u64, width: AccessWidth) -> Result<(), ProxyError> {
        let len = width.bytes();
        log::debug!("master read: addr = {address:#x}, len = {len}");

        let mut buf = [0u8; 8];
        let ok = match self.memory.read(address, &mut buf[..len]) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("master read failed: {e:#}");
                buf = [0u8; 8];
                false
            }
        };

        let value = u64::from_le_bytes(buf);
        write_payload(&mut self.link, width, value)?;
        if self.read_failure == ReadFailurePolicy::TrailingStatus {
            write_status(&mut self.link, ok)?;
        }

        log::debug!(
            "master read {}: addr = {address:#x}, len = {len}, val = {value:#x}",
            if ok { "ok" } else { "fail" }
        );
        Ok(())
    }

    fn handle_write(
        &mut self,
        address: u64,
        width: AccessWidth,
        value: u64,
    ) -> Result<(), ProxyError> {
        let len = width.bytes();
        log::debug!("master write: addr = {address:#x}, len = {len}, val = {value:#x}");

        let ok = match self.memory.write(address, &value.to_le_bytes()[..len]) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("master write failed: {e:#}");
                false
            }
        };
        write_status(&mut self.link, ok)?;

        log::debug!(
            "master write {}: addr = {address:#x}, len = {len}, val = {value:#x}",
            if ok { "ok" } else { "fail" }
        );
        Ok(())
    }
}

/// Owner's view of the background listener thread.
///
/// The thread reports the error that stopped it exactly once through `closed`.
/// A thread that unwinds drops its sender instead, which reads as
/// [`ProxyError::ListenerPanicked`].
pub struct ListenerHandle {
    closed: Receiver<ProxyError>,
    exit: Option<ProxyError>,
    thread: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    pub fn spawn<L, A, I>(
        name: &str,
        listener: ReverseListener<L, A, I>,
    ) -> Result<Self, ProxyError>
    where
        L: Link,
        A: AddressSpace + 'static,
        I: InterruptLine + 'static,
    {
        let (tx, closed) = mpsc::sync_channel(1);
        let thread = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let err = listener.run();
                log::error!("reverse link closed: {err}");
                let _ = tx.send(err);
            })?;

        Ok(Self {
            closed,
            exit: None,
            thread: Some(thread),
        })
    }

    /// The error that stopped the listener, if it has stopped.
    pub fn try_closed(&mut self) -> Option<&ProxyError> {
        if self.exit.is_none() {
            match self.closed.try_recv() {
                Ok(err) => self.exit = Some(err),
                Err(TryRecvError::Disconnected) => self.exit = Some(ProxyError::ListenerPanicked),
                Err(TryRecvError::Empty) => {}
            }
        }
        self.exit.as_ref()
    }

    pub fn is_closed(&mut self) -> bool {
        self.try_closed().is_some()
    }

    /// Block until the listener stops and join its thread.
    pub fn wait_closed(&mut self) -> Option<&ProxyError> {
        if self.exit.is_none() {
            self.exit = Some(self.closed.recv().unwrap_or(ProxyError::ListenerPanicked));
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("reverse listener thread panicked");
            }
        }
        self.exit.as_ref()
    }
}
