//! Byte-stream links between the stub and its peer.
//!
//! A link is anything full-duplex that can block on `read_exact`/`write_all`.
//! The stub never opens links itself; the platform hands it two open ones.

use std::io::{self, Read, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;

pub trait Link: Read + Write + Send + 'static {
    /// A second handle onto the same stream, used to close it from another thread.
    fn try_clone_link(&self) -> io::Result<Self>
    where
        Self: Sized;

    /// Close both directions; a reader blocked on the other handle wakes with EOF.
    fn shutdown(&self) -> io::Result<()>;
}

impl Link for UnixStream {
    fn try_clone_link(&self) -> io::Result<Self> {
        self.try_clone()
    }

    fn shutdown(&self) -> io::Result<()> {
        UnixStream::shutdown(self, Shutdown::Both)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_wakes_blocked_reader() {
        let (local, _remote) = UnixStream::pair().unwrap();
        let mut reader = local.try_clone_link().unwrap();

        let blocked = std::thread::spawn(move || {
            let mut buf = [0u8; 1];
            reader.read_exact(&mut buf)
        });

        Link::shutdown(&local).unwrap();
        let err = blocked.join().unwrap().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
