use std::io;

use thiserror::Error;

use crate::mems::error::MemoryError;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Link error: {0}")]
    Link(#[from] io::Error),

    #[error("Missing {0} link: both links must be open before the stub is constructed")]
    MissingLink(LinkRole),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("MMIO error: {0}")]
    MMIO(#[from] MmioError),

    #[error("Forward link lock poisoned")]
    Poisoned,

    #[error("Reverse listener thread panicked")]
    ListenerPanicked,

    #[error("General error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Which of the two links a message travels on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkRole {
    Forward,
    Reverse,
}

impl std::fmt::Display for LinkRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkRole::Forward => write!(f, "forward"),
            LinkRole::Reverse => write!(f, "reverse"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid access width: {0} bytes (must be 1, 2, 4, or 8)")]
    InvalidWidth(u8),

    #[error("Unexpected {op} request on the {role} link")]
    UnexpectedOperation { op: String, role: LinkRole },
}

#[derive(Error, Debug, Clone)]
pub enum MmioError {
    #[error("Unmapped memory access at address 0x{0:016x}")]
    UnmappedAccess(u64),

    #[error("Invalid alignment: address 0x{addr:016x} not aligned for {size}-byte access")]
    InvalidAlignment { addr: u64, size: usize },

    #[error("Invalid access size: {size} bytes (must be 1, 2, 4, or 8)")]
    InvalidSize { size: usize },

    #[error("Device error: {0}")]
    DeviceError(String),

    #[error(
        "Overlapping MMIO region: new region [0x{new_start:016x}, 0x{new_end:016x}) overlaps with existing region [0x{existing_start:016x}, 0x{existing_end:016x})"
    )]
    OverlappingRegion {
        existing_start: u64,
        existing_end: u64,
        new_start: u64,
        new_end: u64,
    },
}

// Helper constructor for the overlapping region error
impl MmioError {
    pub fn overlapping_region(existing: (u64, u64), new: (u64, u64)) -> Self {
        Self::OverlappingRegion {
            existing_start: existing.0,
            existing_end: existing.1,
            new_start: new.0,
            new_end: new.1,
        }
    }
}

impl From<ProxyError> for MmioError {
    fn from(err: ProxyError) -> Self {
        match err {
            ProxyError::MMIO(inner) => inner,
            other => MmioError::DeviceError(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_link_message() {
        let err = ProxyError::MissingLink(LinkRole::Reverse);
        assert!(err.to_string().contains("reverse link"));
    }

    #[test]
    fn test_proxy_error_into_mmio_error() {
        let err: MmioError = ProxyError::MMIO(MmioError::UnmappedAccess(0x40)).into();
        assert!(matches!(err, MmioError::UnmappedAccess(0x40)));

        let io = io::Error::new(io::ErrorKind::UnexpectedEof, "peer hung up");
        let err: MmioError = ProxyError::from(io).into();
        match err {
            MmioError::DeviceError(msg) => assert!(msg.contains("peer hung up")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
