//! Scratch register bank served by the peer.
//!
//! Layout (offsets within the window):
//! - `0x00` ID, read-only
//! - `0x08` DOORBELL, write-only; every write is handed to the doorbell handler
//! - `0x10..size` scratch registers, read/write, 64 bits each

use crate::devices::MmioDevice;
use crate::devices::register::{Register, RoRegister, RwRegister, WoRegister, lane_read, lane_write};
use crate::err::MmioError;

pub const SCRATCH_ID: u64 = 0x4d4d_494f_5354_4231; // "MMIOSTB1"
pub const SCRATCH_REG_ID: u64 = 0x00;
pub const SCRATCH_REG_DOORBELL: u64 = 0x08;
pub const SCRATCH_REG_BASE: u64 = 0x10;

type DoorbellHandler = Box<dyn FnMut(u64) + Send>;

pub struct ScratchDevice {
    size: u64,
    id: RoRegister,
    doorbell: WoRegister<DoorbellHandler>,
    registers: Vec<RwRegister>,
}

impl ScratchDevice {
    pub fn new(size: u64) -> Self {
        let count = size.saturating_sub(SCRATCH_REG_BASE).div_ceil(8) as usize;
        Self {
            size,
            id: RoRegister::new(SCRATCH_ID),
            doorbell: WoRegister::new(Box::new(|_| {}) as DoorbellHandler),
            registers: vec![RwRegister::new(0, u64::MAX); count],
        }
    }

    pub fn on_doorbell<F>(mut self, handler: F) -> Self
    where
        F: FnMut(u64) + Send + 'static,
    {
        self.doorbell = WoRegister::new(Box::new(handler) as DoorbellHandler);
        self
    }

    fn register(&mut self, offset: u64) -> Result<&mut dyn Register, MmioError> {
        match offset {
            SCRATCH_REG_ID => Ok(&mut self.id),
            SCRATCH_REG_DOORBELL => Ok(&mut self.doorbell),
            _ => {
                let index = ((offset - SCRATCH_REG_BASE) / 8) as usize;
                self.registers
                    .get_mut(index)
                    .map(|reg| reg as &mut dyn Register)
                    .ok_or(MmioError::UnmappedAccess(offset))
            }
        }
    }
}

impl MmioDevice for ScratchDevice {
    fn read(&mut self, offset: u64, size: usize) -> Result<u64, MmioError> {
        let shift = (offset % 8) as usize;
        let reg = self.register(offset - shift as u64)?;
        Ok(lane_read(reg.read(), shift, size))
    }

    fn write(&mut self, offset: u64, size: usize, value: u64) -> Result<(), MmioError> {
        let shift = (offset % 8) as usize;
        let reg = self.register(offset - shift as u64)?;
        let merged = lane_write(reg.read(), shift, size, value);
        reg.write(merged);
        Ok(())
    }

    fn reset(&mut self) {
        for reg in &mut self.registers {
            reg.reset();
        }
    }

    fn get_size(&self) -> u64 {
        self.size
    }
}
