//! ROM/save-media loading and persistence policy are out of scope (spec
//! §1): this crate only forwards CART SRAM bus accesses to whatever the
//! host has already loaded.

use super::memory::decode::SRAM_MASK;

/// Bus-level delegation surface for cartridge save media (spec §4.B).
/// EEPROM/Flash emulation is explicitly a non-goal; this models plain
/// battery-backed SRAM only.
pub trait SaveMedia {
    fn read8(&self, offset: u32) -> u8;
    fn write8(&mut self, offset: u32, value: u8);
}

/// Flat SRAM-sized buffer, useful for tests and for hosts that have not
/// wired up persistence yet.
pub struct SimpleSram {
    bytes: Vec<u8>,
}

impl SimpleSram {
    pub fn new() -> Self {
        SimpleSram {
            bytes: vec![0xFF; super::memory::decode::SRAM_SIZE],
        }
    }
}

impl Default for SimpleSram {
    fn default() -> Self {
        Self::new()
    }
}

impl SaveMedia for SimpleSram {
    fn read8(&self, offset: u32) -> u8 {
        self.bytes[(offset & SRAM_MASK) as usize]
    }

    fn write8(&mut self, offset: u32, value: u8) {
        self.bytes[(offset & SRAM_MASK) as usize] = value;
    }
}
