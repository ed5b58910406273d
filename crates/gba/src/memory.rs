//! The GBA memory subsystem: address decoding, the typed bus access layer,
//! waitstate accounting, the DMA engine, and BIOS HLE routines (spec §1-2).

pub mod decode;
mod bios;
mod dma;
mod error;
mod events;
mod ioreg;
mod waitstate;

pub use bios::{Lz77Target, SwiRegisters};
pub use decode::Region;
pub use dma::{AddressControl, DmaChannel, DmaTiming, RegDmaControlHi, CHANNEL_COUNT};
pub use error::MemoryError;
pub use events::NO_PENDING_IRQ;
pub use ioreg::{IoRegister, IoRegisterFile, NullIoRegisterFile};
pub use waitstate::{AccessWidth, RegWaitcnt, WaitstateTable};

use arm::emu::{AccessType, Waitstates};
use byteorder::{ByteOrder, LittleEndian};

use crate::save::{SaveMedia, SimpleSram};
use crate::video::{SimpleVideoBackend, VideoMemory};

/// Tracks the CPU's current instruction-fetch region (spec §4.D): caches
/// the region tag and its four waitstate figures so per-instruction cycle
/// reporting is a table-free read instead of a fresh lookup.
#[derive(Clone, Copy)]
pub struct ActiveRegion {
    pub region: Region,
    table_index: usize,
    pub non_seq16: Waitstates,
    pub seq16: Waitstates,
    pub non_seq32: Waitstates,
    pub seq32: Waitstates,
}

impl ActiveRegion {
    fn at(addr: u32, table: &WaitstateTable) -> ActiveRegion {
        let table_index = Region::table_index(addr);
        ActiveRegion {
            region: Region::from_addr(addr),
            table_index,
            non_seq16: table.non_seq(AccessWidth::Half, table_index),
            seq16: table.seq(AccessWidth::Half, table_index),
            non_seq32: table.non_seq(AccessWidth::Word, table_index),
            seq32: table.seq(AccessWidth::Word, table_index),
        }
    }

    fn refresh(&mut self, table: &WaitstateTable) {
        *self = ActiveRegion {
            region: self.region,
            table_index: self.table_index,
            non_seq16: table.non_seq(AccessWidth::Half, self.table_index),
            seq16: table.seq(AccessWidth::Half, self.table_index),
            non_seq32: table.non_seq(AccessWidth::Word, self.table_index),
            seq32: table.seq(AccessWidth::Word, self.table_index),
        };
    }
}

/// The memory entity (spec §3): owns every buffer and register the bus
/// layer, waitstate table, and DMA engine need, plus borrowed handles to
/// the collaborators that own VRAM/OAM/palette and save media.
pub struct GbaMemory {
    bios: Vec<u8>,
    wram: Vec<u8>,
    iwram: Vec<u8>,
    rom: Vec<u8>,
    rom_mask: u32,
    io_shadow: [u8; decode::IO_SIZE],
    dma: [DmaChannel; CHANNEL_COUNT],
    waitstates: WaitstateTable,
    waitcnt: RegWaitcnt,
    active_region: ActiveRegion,
    video: Box<dyn VideoMemory>,
    save: Box<dyn SaveMedia>,
    io: Box<dyn IoRegisterFile>,
    cartridge_unmapped_hits: u64,
    last_error: Option<MemoryError>,
}

fn try_zeroed_vec(len: usize) -> Result<Vec<u8>, MemoryError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| MemoryError::OutOfMemory)?;
    buf.resize(len, 0);
    Ok(buf)
}

impl GbaMemory {
    /// Allocates every owned buffer up front. Fails with
    /// [`MemoryError::OutOfMemory`] instead of aborting if the host is out
    /// of memory (spec §5, "scoped acquisition").
    pub fn new() -> Result<Self, MemoryError> {
        let bios = try_zeroed_vec(decode::BIOS_SIZE)?;
        let wram = try_zeroed_vec(decode::WRAM_SIZE)?;
        let iwram = try_zeroed_vec(decode::IWRAM_SIZE)?;
        let waitstates = WaitstateTable::default();

        Ok(GbaMemory {
            bios,
            wram,
            iwram,
            rom: Vec::new(),
            rom_mask: 0,
            io_shadow: [0; decode::IO_SIZE],
            dma: [DmaChannel::default(); CHANNEL_COUNT],
            active_region: ActiveRegion::at(0, &waitstates),
            waitstates,
            waitcnt: RegWaitcnt::new(0),
            video: Box::new(SimpleVideoBackend::new()),
            save: Box::new(SimpleSram::new()),
            io: Box::new(NullIoRegisterFile),
            cartridge_unmapped_hits: 0,
            last_error: None,
        })
    }

    pub fn set_bios(&mut self, image: &[u8]) {
        let len = image.len().min(self.bios.len());
        self.bios[..len].copy_from_slice(&image[..len]);
        tracing::debug!(bytes = len, "BIOS image loaded");
    }

    /// Installs cartridge ROM. The mask is derived from the next power of
    /// two at or above the image size, capped at 32 MiB (spec §3).
    pub fn set_rom(&mut self, rom: Vec<u8>) {
        let size = rom.len().max(1).next_power_of_two().min(decode::MAX_ROM_SIZE);
        self.rom_mask = (size - 1) as u32;
        self.rom = rom;
        tracing::debug!(bytes = self.rom.len(), mask = self.rom_mask, "ROM installed");
    }

    pub fn set_video_backend(&mut self, backend: Box<dyn VideoMemory>) {
        self.video = backend;
    }

    pub fn set_save_media(&mut self, media: Box<dyn SaveMedia>) {
        self.save = media;
    }

    pub fn set_io_register_file(&mut self, file: Box<dyn IoRegisterFile>) {
        self.io = file;
    }

    pub fn last_error(&self) -> Option<MemoryError> {
        self.last_error
    }

    pub fn cartridge_unmapped_hits(&self) -> u64 {
        self.cartridge_unmapped_hits
    }

    /// Invoked by the CPU when instruction fetch leaves one region (spec
    /// §4.D).
    pub fn set_active_region(&mut self, addr: u32) {
        self.active_region = ActiveRegion::at(addr, &self.waitstates);
    }

    /// Recomputes the gamepak/SRAM waitstate entries from a freshly
    /// written `WAITCNT` and refreshes the active region's cached figures
    /// (spec §4.C).
    pub fn adjust_waitstates(&mut self, waitcnt16: u16) {
        self.waitcnt = RegWaitcnt::from(waitcnt16 as u32);
        self.waitstates.adjust(self.waitcnt);
        self.active_region.refresh(&self.waitstates);
        tracing::debug!(waitcnt = waitcnt16, "waitstates recomputed");
    }

    fn rom_unmapped(&mut self) -> bool {
        if self.rom.is_empty() {
            self.cartridge_unmapped_hits += 1;
            self.last_error = Some(MemoryError::CartridgeUnmapped);
            true
        } else {
            false
        }
    }

    fn read_io16(&mut self, offset: u32) -> u16 {
        self.io.read16(offset)
    }

    // -- 8-bit bus access -------------------------------------------------

    pub fn load8(&mut self, addr: u32, access: AccessType) -> (u8, Waitstates) {
        let (region, offset) = decode::decode(addr, self.rom_mask, decode::SRAM_MASK);
        let cost = self.waitstates.cost(AccessWidth::Half, access, addr);
        let value = match region {
            Region::Bios => self.bios_byte(offset),
            Region::Wram => self.wram[offset as usize],
            Region::Iwram => self.iwram[offset as usize],
            Region::Io => {
                let reg = self.read_io16(offset & !1);
                if offset & 1 != 0 { (reg >> 8) as u8 } else { reg as u8 }
            }
            Region::Palette => self.video.read_palette8(offset),
            Region::Vram => {
                let reg = self.video.read_vram16(offset & !1);
                if offset & 1 != 0 { (reg >> 8) as u8 } else { reg as u8 }
            }
            Region::Oam => {
                let reg = self.video.read_oam16(offset & !1);
                if offset & 1 != 0 { (reg >> 8) as u8 } else { reg as u8 }
            }
            Region::Cart0 | Region::Cart1 | Region::Cart2 => {
                if self.rom_unmapped() {
                    0
                } else {
                    *self.rom.get(offset as usize).unwrap_or(&0)
                }
            }
            Region::CartSram => self.save.read8(offset),
            Region::Unmapped => 0,
        };
        (value, cost)
    }

    pub fn load8_signed(&mut self, addr: u32, access: AccessType) -> (i32, Waitstates) {
        let (value, cost) = self.load8(addr, access);
        (value as i8 as i32, cost)
    }

    pub fn store8(&mut self, addr: u32, value: u8, access: AccessType) -> Waitstates {
        let (region, offset) = decode::decode(addr, self.rom_mask, decode::SRAM_MASK);
        let cost = self.waitstates.cost(AccessWidth::Half, access, addr);
        match region {
            Region::Bios => {}
            Region::Wram => self.wram[offset as usize] = value,
            Region::Iwram => self.iwram[offset as usize] = value,
            Region::Io => self.io.write8(offset, value),
            Region::Palette => self.video.write_palette8(offset, value),
            Region::Vram | Region::Oam => {}
            Region::Cart0 | Region::Cart1 | Region::Cart2 => {}
            Region::CartSram => self.save.write8(offset, value),
            Region::Unmapped => {}
        }
        cost
    }

    fn bios_byte(&self, offset: u32) -> u8 {
        if self.active_region.region == Region::Bios {
            *self.bios.get(offset as usize).unwrap_or(&0)
        } else {
            0
        }
    }

    // -- 16-bit bus access --------------------------------------------------

    pub fn load16(&mut self, addr: u32, access: AccessType) -> (u16, Waitstates) {
        let addr = addr & !1;
        let (region, offset) = decode::decode(addr, self.rom_mask, decode::SRAM_MASK);
        let cost = self.waitstates.cost(AccessWidth::Half, access, addr);
        let value = match region {
            Region::Bios => self.bios_halfword(offset),
            Region::Wram => LittleEndian::read_u16(&self.wram[offset as usize..]),
            Region::Iwram => LittleEndian::read_u16(&self.iwram[offset as usize..]),
            Region::Io => self.read_io16(offset),
            Region::Palette => self.video.read_palette16(offset),
            Region::Vram => self.video.read_vram16(offset),
            Region::Oam => self.video.read_oam16(offset),
            Region::Cart0 | Region::Cart1 | Region::Cart2 => {
                if self.rom_unmapped() {
                    0
                } else {
                    let offset = offset as usize;
                    if offset + 1 < self.rom.len() {
                        LittleEndian::read_u16(&self.rom[offset..])
                    } else {
                        0
                    }
                }
            }
            Region::CartSram => u16::from(self.save.read8(offset)) * 0x0101,
            Region::Unmapped => 0,
        };
        (value, cost)
    }

    pub fn load16_signed(&mut self, addr: u32, access: AccessType) -> (i32, Waitstates) {
        let (value, cost) = self.load16(addr, access);
        (value as i16 as i32, cost)
    }

    pub fn store16(&mut self, addr: u32, value: u16, access: AccessType) -> Waitstates {
        let addr = addr & !1;
        let (region, offset) = decode::decode(addr, self.rom_mask, decode::SRAM_MASK);
        let cost = self.waitstates.cost(AccessWidth::Half, access, addr);
        match region {
            Region::Bios => {}
            Region::Wram => LittleEndian::write_u16(&mut self.wram[offset as usize..], value),
            Region::Iwram => LittleEndian::write_u16(&mut self.iwram[offset as usize..], value),
            Region::Io => self.io.write16(offset, value),
            Region::Palette => self.video.write_palette16(offset, value),
            Region::Vram => self.video.write_vram16(offset, value),
            Region::Oam => self.video.write_oam16(offset, value),
            Region::Cart0 | Region::Cart1 | Region::Cart2 => {}
            Region::CartSram => self.save.write8(offset, value as u8),
            Region::Unmapped => {}
        }
        cost
    }

    fn bios_halfword(&self, offset: u32) -> u16 {
        if self.active_region.region == Region::Bios {
            let offset = offset as usize;
            if offset + 1 < self.bios.len() {
                LittleEndian::read_u16(&self.bios[offset..])
            } else {
                0
            }
        } else {
            0
        }
    }

    // -- 32-bit bus access --------------------------------------------------

    pub fn load32(&mut self, addr: u32, access: AccessType) -> (u32, Waitstates) {
        let addr = addr & !3;
        let (region, offset) = decode::decode(addr, self.rom_mask, decode::SRAM_MASK);
        let cost = self.waitstates.cost(AccessWidth::Word, access, addr);
        let value = match region {
            Region::Bios => self.bios_word(offset),
            Region::Wram => LittleEndian::read_u32(&self.wram[offset as usize..]),
            Region::Iwram => LittleEndian::read_u32(&self.iwram[offset as usize..]),
            Region::Io => {
                let lo = u32::from(self.read_io16(offset));
                let hi = u32::from(self.read_io16(offset.wrapping_add(2)));
                lo | (hi << 16)
            }
            Region::Palette => {
                let lo = u32::from(self.video.read_palette16(offset));
                let hi = u32::from(self.video.read_palette16(offset.wrapping_add(2)));
                lo | (hi << 16)
            }
            Region::Vram => {
                let lo = u32::from(self.video.read_vram16(offset));
                let hi = u32::from(self.video.read_vram16(offset.wrapping_add(2)));
                lo | (hi << 16)
            }
            Region::Oam => {
                let lo = u32::from(self.video.read_oam16(offset));
                let hi = u32::from(self.video.read_oam16(offset.wrapping_add(2)));
                lo | (hi << 16)
            }
            Region::Cart0 | Region::Cart1 | Region::Cart2 => {
                if self.rom_unmapped() {
                    0
                } else {
                    let offset = offset as usize;
                    if offset + 3 < self.rom.len() {
                        LittleEndian::read_u32(&self.rom[offset..])
                    } else {
                        0
                    }
                }
            }
            Region::CartSram => u32::from(self.save.read8(offset)) * 0x0101_0101,
            Region::Unmapped => 0,
        };
        (value, cost)
    }

    pub fn store32(&mut self, addr: u32, value: u32, access: AccessType) -> Waitstates {
        let addr = addr & !3;
        let (region, offset) = decode::decode(addr, self.rom_mask, decode::SRAM_MASK);
        let cost = self.waitstates.cost(AccessWidth::Word, access, addr);
        match region {
            Region::Bios => {}
            Region::Wram => LittleEndian::write_u32(&mut self.wram[offset as usize..], value),
            Region::Iwram => LittleEndian::write_u32(&mut self.iwram[offset as usize..], value),
            Region::Io => {
                self.io.write16(offset, value as u16);
                self.io.write16(offset.wrapping_add(2), (value >> 16) as u16);
            }
            Region::Palette => {
                self.video.write_palette16(offset, value as u16);
                self.video.write_palette16(offset.wrapping_add(2), (value >> 16) as u16);
            }
            Region::Vram => {
                self.video.write_vram16(offset, value as u16);
                self.video.write_vram16(offset.wrapping_add(2), (value >> 16) as u16);
            }
            Region::Oam => {
                self.video.write_oam16(offset, value as u16);
                self.video.write_oam16(offset.wrapping_add(2), (value >> 16) as u16);
            }
            Region::Cart0 | Region::Cart1 | Region::Cart2 => {}
            Region::CartSram => self.save.write8(offset, value as u8),
            Region::Unmapped => {}
        }
        cost
    }

    fn bios_word(&self, offset: u32) -> u32 {
        if self.active_region.region == Region::Bios {
            let offset = offset as usize;
            if offset + 3 < self.bios.len() {
                LittleEndian::read_u32(&self.bios[offset..])
            } else {
                0
            }
        } else {
            0
        }
    }
}

impl arm::emu::Memory for GbaMemory {
    fn load32(&mut self, address: u32, access: AccessType) -> (u32, Waitstates) {
        GbaMemory::load32(self, address, access)
    }

    fn load16(&mut self, address: u32, access: AccessType) -> (u16, Waitstates) {
        GbaMemory::load16(self, address, access)
    }

    fn load8(&mut self, address: u32, access: AccessType) -> (u8, Waitstates) {
        GbaMemory::load8(self, address, access)
    }

    fn store32(&mut self, address: u32, value: u32, access: AccessType) -> Waitstates {
        GbaMemory::store32(self, address, value, access)
    }

    fn store16(&mut self, address: u32, value: u16, access: AccessType) -> Waitstates {
        GbaMemory::store16(self, address, value, access)
    }

    fn store8(&mut self, address: u32, value: u8, access: AccessType) -> Waitstates {
        GbaMemory::store8(self, address, value, access)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wram_round_trip_matches_scenario_one() {
        let mut mem = GbaMemory::new().unwrap();
        mem.store32(0x0200_0000, 0xDEAD_BEEF, AccessType::NonSequential);
        assert_eq!(mem.load32(0x0200_0000, AccessType::NonSequential).0, 0xDEAD_BEEF);
        assert_eq!(mem.load8(0x0200_0000, AccessType::NonSequential).0, 0xEF);
        assert_eq!(mem.load8(0x0200_0003, AccessType::NonSequential).0, 0xDE);
    }

    #[test]
    fn halfword_store_then_word_load_preserves_adjacent_half() {
        let mut mem = GbaMemory::new().unwrap();
        mem.store16(0x0300_0000, 0xBEEF, AccessType::NonSequential);
        mem.store16(0x0300_0002, 0xCAFE, AccessType::NonSequential);
        let (word, _) = mem.load32(0x0300_0000, AccessType::NonSequential);
        assert_eq!(word, 0xCAFE_BEEF);
    }

    #[test]
    fn bios_reads_as_zero_once_fetch_leaves_bios_region() {
        let mut mem = GbaMemory::new().unwrap();
        mem.set_bios(&[0xAA; decode::BIOS_SIZE]);
        mem.set_active_region(0x0000_0000);
        assert_eq!(mem.load8(0x0000_0000, AccessType::NonSequential).0, 0xAA);
        mem.set_active_region(0x0800_0000);
        assert_eq!(mem.load8(0x0000_0000, AccessType::NonSequential).0, 0);
    }

    #[test]
    fn rom_access_without_a_loaded_cartridge_is_non_fatal() {
        let mut mem = GbaMemory::new().unwrap();
        let (value, _) = mem.load32(0x0800_0000, AccessType::NonSequential);
        assert_eq!(value, 0);
        assert_eq!(mem.cartridge_unmapped_hits(), 1);
        assert_eq!(mem.last_error(), Some(MemoryError::CartridgeUnmapped));
    }
}
