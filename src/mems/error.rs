use thiserror::Error;

/// Errors raised by guest physical memory accesses
#[derive(Error, Debug, Clone)]
pub enum MemoryError {
    #[error("Segmentation fault at address 0x{address:x} (size: {size}): {message}")]
    SegmentationFault {
        address: u64,
        size: usize,
        message: String,
    },

    #[error("Memory region overlap: 0x{start:x}-0x{end:x} overlaps with existing segment")]
    RegionOverlap { start: u64, end: u64 },

    #[error("Invalid size: {size} bytes is invalid for this operation")]
    InvalidSize { size: usize },

    #[error("Memory lock poisoned while accessing 0x{address:x}")]
    Poisoned { address: u64 },
}

impl MemoryError {
    pub fn segfault(address: u64, size: usize, message: impl Into<String>) -> Self {
        Self::SegmentationFault {
            address,
            size,
            message: message.into(),
        }
    }

    pub fn region_overlap(start: u64, end: u64) -> Self {
        Self::RegionOverlap { start, end }
    }

    pub fn invalid_size(size: usize) -> Self {
        Self::InvalidSize { size }
    }
}

/// Result type alias for memory operations using anyhow
pub type MemoryResult<T> = anyhow::Result<T>;

/// Lifts a [`MemoryError`] into [`MemoryResult`] with the accessed range attached.
pub trait MemoryResultExt<T> {
    fn with_range_context(self, operation: &str, address: u64, size: usize) -> MemoryResult<T>;
}

impl<T> MemoryResultExt<T> for Result<T, MemoryError> {
    fn with_range_context(self, operation: &str, address: u64, size: usize) -> MemoryResult<T> {
        self.map_err(|e| {
            let last = address.saturating_add((size as u64).saturating_sub(1));
            anyhow::Error::from(e).context(format!(
                "Memory operation '{operation}' failed for range 0x{address:x}-0x{last:x} (size: {size})"
            ))
        })
    }
}
