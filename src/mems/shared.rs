use std::sync::{Arc, Mutex};

use anyhow::Context;

use crate::mems::error::{MemoryError, MemoryResult, MemoryResultExt};

/// Transactional access to the shared physical address space.
///
/// Each call is one transaction: it either completes for the whole range or
/// fails without partial effects visible to other callers.
pub trait AddressSpace: Send + Sync {
    fn read(&self, address: u64, buf: &mut [u8]) -> MemoryResult<()>;
    fn write(&self, address: u64, data: &[u8]) -> MemoryResult<()>;
}

impl<T: AddressSpace + ?Sized> AddressSpace for Arc<T> {
    fn read(&self, address: u64, buf: &mut [u8]) -> MemoryResult<()> {
        (**self).read(address, buf)
    }

    fn write(&self, address: u64, data: &[u8]) -> MemoryResult<()> {
        (**self).write(address, data)
    }
}

#[derive(Debug)]
pub struct Segment {
    pub base: u64,         // base address (guest physical)
    pub size: usize,       // size
    pub memory: Box<[u8]>, // memory content
}

impl Segment {
    pub fn new(base: u64, size: usize) -> Self {
        Segment {
            base,
            size,
            memory: vec![0; size].into_boxed_slice(),
        }
    }

    pub fn end(&self) -> u64 {
        self.base.saturating_add(self.size as u64)
    }

    pub fn contains(&self, address: u64, size: usize) -> bool {
        address >= self.base && address.saturating_add(size as u64) <= self.end()
    }

    // Offset within segment for given address
    pub fn get_offset(&self, address: u64) -> Option<usize> {
        if address >= self.base && address < self.end() {
            Some((address - self.base) as usize)
        } else {
            None
        }
    }
}

#[derive(Debug, Default)]
pub struct SharedMemory {
    pub segments: Vec<Segment>,
}

impl SharedMemory {
    pub fn add_segment(&mut self, base: u64, size: usize) -> MemoryResult<&mut Segment> {
        if size == 0 {
            return Err(MemoryError::invalid_size(size).into());
        }

        let end = base.saturating_add(size as u64);
        if self
            .segments
            .iter()
            .any(|segment| base < segment.end() && end > segment.base)
        {
            return Err(MemoryError::region_overlap(base, end).into());
        }

        self.segments.push(Segment::new(base, size));
        let index = self.segments.len() - 1;
        Ok(&mut self.segments[index])
    }

    fn unmapped(address: u64, size: usize) -> MemoryError {
        MemoryError::segfault(
            address,
            size,
            format!(
                "Address range 0x{:x}-0x{:x} not mapped",
                address,
                address.saturating_add(size as u64).saturating_sub(1)
            ),
        )
    }

    fn find_segment(&self, address: u64, size: usize) -> Result<&Segment, MemoryError> {
        self.segments
            .iter()
            .find(|seg| seg.contains(address, size))
            .ok_or_else(|| Self::unmapped(address, size))
    }

    fn find_segment_mut(
        &mut self,
        address: u64,
        size: usize,
    ) -> Result<&mut Segment, MemoryError> {
        self.segments
            .iter_mut()
            .find(|seg| seg.contains(address, size))
            .ok_or_else(|| Self::unmapped(address, size))
    }

    pub fn read_into(&self, address: u64, buf: &mut [u8]) -> MemoryResult<()> {
        let size = buf.len();
        if size == 0 {
            return Ok(());
        }

        let segment = self
            .find_segment(address, size)
            .with_range_context("read_bytes", address, size)?;

        let offset = (address - segment.base) as usize;
        buf.copy_from_slice(&segment.memory[offset..offset + size]);
        Ok(())
    }

    pub fn read_bytes(&self, address: u64, size: usize) -> MemoryResult<Vec<u8>> {
        let mut buf = vec![0; size];
        self.read_into(address, &mut buf)?;
        Ok(buf)
    }

    pub fn write_bytes(&mut self, address: u64, data: &[u8]) -> MemoryResult<()> {
        let size = data.len();
        if size == 0 {
            return Ok(());
        }

        let segment = self.find_segment_mut(address, size).with_range_context(
            "write_bytes",
            address,
            size,
        )?;

        let offset = (address - segment.base) as usize;
        segment.memory[offset..offset + size].copy_from_slice(data);
        Ok(())
    }

    pub fn read<T>(&self, address: u64) -> MemoryResult<T>
    where
        T: FromBytes,
    {
        let size = std::mem::size_of::<T>();
        let bytes = self.read_bytes(address, size).with_context(|| {
            format!(
                "Failed to read {} at address 0x{:x}",
                std::any::type_name::<T>(),
                address
            )
        })?;
        Ok(T::from_le_slice(&bytes))
    }

    pub fn write<T>(&mut self, address: u64, value: T) -> MemoryResult<()>
    where
        T: ToBytes,
    {
        self.write_bytes(address, &value.to_le_vec())
            .with_context(|| {
                format!(
                    "Failed to write {} at address 0x{:x}",
                    std::any::type_name::<T>(),
                    address
                )
            })
    }
}

/// Cloneable handle to a `SharedMemory` that can be handed to the listener thread.
///
/// The lock is held for exactly one access, which is what makes every
/// `AddressSpace` call atomic with respect to the others.
#[derive(Debug, Clone, Default)]
pub struct GuestMemory {
    inner: Arc<Mutex<SharedMemory>>,
}

impl GuestMemory {
    pub fn new(memory: SharedMemory) -> Self {
        Self {
            inner: Arc::new(Mutex::new(memory)),
        }
    }

    /// Single zero-initialized segment at `base`.
    pub fn with_segment(base: u64, size: usize) -> MemoryResult<Self> {
        let mut memory = SharedMemory::default();
        memory.add_segment(base, size)?;
        Ok(Self::new(memory))
    }

    /// Run `f` with the lock held.
    pub fn with<R>(&self, address: u64, f: impl FnOnce(&mut SharedMemory) -> R) -> MemoryResult<R> {
        let mut memory = self
            .inner
            .lock()
            .map_err(|_| MemoryError::Poisoned { address })?;
        Ok(f(&mut memory))
    }
}

impl AddressSpace for GuestMemory {
    fn read(&self, address: u64, buf: &mut [u8]) -> MemoryResult<()> {
        self.with(address, |memory| memory.read_into(address, buf))?
    }

    fn write(&self, address: u64, data: &[u8]) -> MemoryResult<()> {
        self.with(address, |memory| memory.write_bytes(address, data))?
    }
}

pub trait FromBytes: Sized {
    fn from_le_slice(bytes: &[u8]) -> Self;
}

pub trait ToBytes {
    fn to_le_vec(&self) -> Vec<u8>;
}

macro_rules! impl_bytes {
    ($($ty:ty),*) => {
        $(
            impl FromBytes for $ty {
                fn from_le_slice(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(&bytes[..std::mem::size_of::<$ty>()]);
                    <$ty>::from_le_bytes(raw)
                }
            }

            impl ToBytes for $ty {
                fn to_le_vec(&self) -> Vec<u8> {
                    self.to_le_bytes().to_vec()
                }
            }
        )*
    };
}

impl_bytes!(u8, u16, u32, u64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_operations() {
        let mut memory = SharedMemory::default();
        memory.add_segment(0x1000, 0x1000).unwrap();

        memory.write::<u32>(0x1000, 0x12345678).unwrap();
        assert_eq!(memory.read::<u32>(0x1000).unwrap(), 0x12345678);

        memory.write::<u64>(0x1008, 0x123456789ABCDEF0).unwrap();
        assert_eq!(memory.read::<u64>(0x1008).unwrap(), 0x123456789ABCDEF0);

        // Segmentation fault
        assert!(memory.read::<u32>(0x2000).is_err());
        assert!(memory.write::<u32>(0x2000, 42).is_err());
        // Straddles the end of the segment
        assert!(memory.read::<u64>(0x1ffc).is_err());
    }

    #[test]
    fn test_segment_validation() {
        let mut memory = SharedMemory::default();
        memory.add_segment(0x1000, 0x1000).unwrap();

        assert!(memory.add_segment(0x1500, 0x1000).is_err());
        assert!(memory.add_segment(0x800, 0x1000).is_err());
        assert!(memory.add_segment(0x3000, 0).is_err());
        assert!(memory.add_segment(0x2000, 0x100).is_ok());
    }

    #[test]
    fn test_guest_memory_is_shared_between_clones() {
        let memory = GuestMemory::with_segment(0, 0x100).unwrap();
        let clone = memory.clone();

        clone.write(0x10, &[0xef, 0xbe, 0xad, 0xde]).unwrap();

        let mut buf = [0u8; 4];
        memory.read(0x10, &mut buf).unwrap();
        assert_eq!(u32::from_le_bytes(buf), 0xdeadbeef);
        assert!(memory.read(0x100, &mut buf).is_err());
    }
}
