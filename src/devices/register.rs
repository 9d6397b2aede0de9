//! Register primitives for simulated devices.
//!
//! Registers are 64 bits wide. Narrower bus accesses touch a byte lane inside
//! one register; `lane_read`/`lane_write` do the shifting and merging.

pub trait Register {
    fn read(&self) -> u64;
    fn write(&mut self, value: u64);
    fn reset(&mut self);
}

/// `size` bytes of `reg`, starting `shift` bytes in.
pub fn lane_read(reg: u64, shift: usize, size: usize) -> u64 {
    let value = reg >> (shift * 8);
    if size >= 8 {
        value
    } else {
        value & ((1u64 << (size * 8)) - 1)
    }
}

/// Replace `size` bytes of `reg`, starting `shift` bytes in, with the low bytes of `value`.
pub fn lane_write(reg: u64, shift: usize, size: usize, value: u64) -> u64 {
    let lane = if size >= 8 {
        u64::MAX
    } else {
        (1u64 << (size * 8)) - 1
    };
    let mask = lane << (shift * 8);
    (reg & !mask) | ((value << (shift * 8)) & mask)
}

#[derive(Debug, Clone)]
pub struct RwRegister {
    value: u64,
    reset_value: u64,
    mask: u64, // writable bits mask
}

impl RwRegister {
    pub fn new(initial_value: u64, writable_mask: u64) -> Self {
        Self {
            value: initial_value,
            reset_value: initial_value,
            mask: writable_mask,
        }
    }
}

impl Register for RwRegister {
    fn read(&self) -> u64 {
        self.value
    }

    fn write(&mut self, value: u64) {
        self.value = (self.value & !self.mask) | (value & self.mask);
    }

    fn reset(&mut self) {
        self.value = self.reset_value;
    }
}

#[derive(Debug, Clone)]
pub struct RoRegister {
    value: u64,
}

impl RoRegister {
    pub fn new(value: u64) -> Self {
        Self { value }
    }
}

impl Register for RoRegister {
    fn read(&self) -> u64 {
        self.value
    }

    fn write(&mut self, _value: u64) {
        // read-only
    }

    fn reset(&mut self) {}
}

/// Write-only register with side effects
pub struct WoRegister<F>
where
    F: FnMut(u64),
{
    write_handler: F,
}

impl<F> WoRegister<F>
where
    F: FnMut(u64),
{
    pub fn new(write_handler: F) -> Self {
        Self { write_handler }
    }
}

impl<F> Register for WoRegister<F>
where
    F: FnMut(u64),
{
    fn read(&self) -> u64 {
        0 // Write-only registers return 0 on read
    }

    fn write(&mut self, value: u64) {
        (self.write_handler)(value);
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lanes() {
        let reg = 0x8877_6655_4433_2211;
        assert_eq!(lane_read(reg, 0, 8), reg);
        assert_eq!(lane_read(reg, 4, 4), 0x8877_6655);
        assert_eq!(lane_read(reg, 2, 2), 0x4433);
        assert_eq!(lane_read(reg, 7, 1), 0x88);

        assert_eq!(lane_write(reg, 2, 2, 0xbeef), 0x8877_6655_beef_2211);
        assert_eq!(lane_write(reg, 0, 8, 1), 1);
        assert_eq!(lane_write(0, 7, 1, 0x1ff), 0xff00_0000_0000_0000);
    }

    #[test]
    fn test_rw_register_mask_and_reset() {
        let mut reg = RwRegister::new(0xf0, 0x0f);
        reg.write(0xff);
        assert_eq!(reg.read(), 0xff);
        reg.write(0x00);
        assert_eq!(reg.read(), 0xf0);
        reg.write(0x05);
        reg.reset();
        assert_eq!(reg.read(), 0xf0);
    }

    #[test]
    fn test_wo_register_invokes_handler() {
        let mut seen = Vec::new();
        {
            let mut reg = WoRegister::new(|v| seen.push(v));
            reg.write(7);
            assert_eq!(reg.read(), 0);
        }
        assert_eq!(seen, vec![7]);
    }
}
