use crate::clock::Waitstates;

/// Narrow bus capability handed to a CPU-like caller. A concrete memory
/// entity implements this directly rather than being reached through a
/// struct downcast, so callers only see the eight typed operations below.
pub trait Memory {
    fn load32(&mut self, address: u32, access: AccessType) -> (u32, Waitstates) {
        let (lo, ws_lo) = self.load16(address, access);
        let (hi, ws_hi) = self.load16(address.wrapping_add(2), AccessType::Sequential);
        (((hi as u32) << 16) | lo as u32, ws_lo + ws_hi)
    }

    fn load16(&mut self, address: u32, access: AccessType) -> (u16, Waitstates) {
        let (lo, ws_lo) = self.load8(address, access);
        let (hi, ws_hi) = self.load8(address.wrapping_add(1), AccessType::Sequential);
        (((hi as u16) << 8) | lo as u16, ws_lo + ws_hi)
    }

    fn load8(&mut self, address: u32, access: AccessType) -> (u8, Waitstates);

    fn store32(&mut self, address: u32, value: u32, access: AccessType) -> Waitstates {
        let ws_lo = self.store16(address, value as u16, access);
        let ws_hi = self.store16(address.wrapping_add(2), (value >> 16) as u16, AccessType::Sequential);
        ws_lo + ws_hi
    }

    fn store16(&mut self, address: u32, value: u16, access: AccessType) -> Waitstates {
        let ws_lo = self.store8(address, value as u8, access);
        let ws_hi = self.store8(address.wrapping_add(1), (value >> 8) as u8, AccessType::Sequential);
        ws_lo + ws_hi
    }

    fn store8(&mut self, address: u32, value: u8, access: AccessType) -> Waitstates;
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum AccessType {
    Sequential,
    NonSequential,
}
