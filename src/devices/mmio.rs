use std::collections::BTreeMap;

use crate::err::MmioError;

/// A device occupying a window on the MMIO bus. Offsets are window-relative.
pub trait MmioDevice: Send {
    fn read(&mut self, offset: u64, size: usize) -> Result<u64, MmioError>;
    fn write(&mut self, offset: u64, size: usize, value: u64) -> Result<(), MmioError>;
    fn reset(&mut self);
    fn get_size(&self) -> u64;
}

struct MmioRegion {
    base_addr: u64,
    size: u64,
    device: Box<dyn MmioDevice>,
}

impl MmioRegion {
    fn end(&self) -> u64 {
        self.base_addr + self.size
    }
}

/// The bus: routes each access to the one window that contains it.
#[derive(Default)]
pub struct MmioManager {
    regions: BTreeMap<u64, MmioRegion>, // Sorted by base address
}

impl MmioManager {
    pub fn register_device(
        &mut self,
        base: u64,
        device: Box<dyn MmioDevice>,
    ) -> Result<(), MmioError> {
        let size = device.get_size();
        let end = base
            .checked_add(size)
            .ok_or(MmioError::UnmappedAccess(base))?;

        if let Some(existing) = self.find_overlap(base, end) {
            return Err(MmioError::overlapping_region(existing, (base, end)));
        }

        log::debug!("Mapped MMIO window [{base:#x}, {end:#x})");
        self.regions.insert(
            base,
            MmioRegion {
                base_addr: base,
                size,
                device,
            },
        );

        Ok(())
    }

    /// `(base, end)` of every registered window, in address order.
    pub fn windows(&self) -> Vec<(u64, u64)> {
        self.regions
            .values()
            .map(|region| (region.base_addr, region.end()))
            .collect()
    }

    pub fn handle_write(&mut self, addr: u64, size: usize, value: u64) -> Result<(), MmioError> {
        log::trace!("Write {value:#x} to {addr:#x} of size {size}");
        let (region, offset) = self.locate(addr, size)?;
        region.device.write(offset, size, value)
    }

    pub fn handle_read(&mut self, addr: u64, size: usize) -> Result<u64, MmioError> {
        log::trace!("Read from {addr:#x} of size {size}");
        let (region, offset) = self.locate(addr, size)?;
        region.device.read(offset, size)
    }

    fn locate(&mut self, addr: u64, size: usize) -> Result<(&mut MmioRegion, u64), MmioError> {
        if !matches!(size, 1 | 2 | 4 | 8) {
            return Err(MmioError::InvalidSize { size });
        }
        if addr & (size as u64 - 1) != 0 {
            return Err(MmioError::InvalidAlignment { addr, size });
        }

        let (_, region) = self
            .regions
            .range_mut(..=addr)
            .next_back()
            .ok_or(MmioError::UnmappedAccess(addr))?;

        let offset = addr - region.base_addr;
        let in_window = offset < region.size
            && offset
                .checked_add(size as u64)
                .is_some_and(|end| end <= region.size);
        if !in_window {
            return Err(MmioError::UnmappedAccess(addr));
        }
        Ok((region, offset))
    }

    /// find a overlapping region if it exists, O(log n)
    fn find_overlap(&self, base: u64, end: u64) -> Option<(u64, u64)> {
        if let Some((_, region)) = self.regions.range(base..).next() {
            if region.base_addr < end {
                return Some((region.base_addr, region.end()));
            }
        }

        if let Some((_, region)) = self.regions.range(..base).next_back() {
            if region.end() > base {
                return Some((region.base_addr, region.end()));
            }
        }

        None
    }
}
