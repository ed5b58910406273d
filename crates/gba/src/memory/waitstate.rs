//! The waitstate table (spec §4.C): 256 entries indexed by the top byte of
//! the address, of which only 0–14 ever hold a non-zero value.

use arm::emu::Waitstates;
use pyrite_derive::IoRegister;

pub const TABLE_LEN: usize = 256;

const BASE_NON_SEQ: [u8; 15] = [0, 0, 2, 0, 0, 0, 0, 0, 4, 4, 4, 4, 4, 4, 4];
const BASE_SEQ: [u8; 15] = [0, 0, 2, 0, 0, 0, 0, 0, 2, 2, 4, 4, 8, 8, 4];

const ROM_NON_SEQ: [u8; 4] = [4, 3, 2, 8];
const ROM_SEQ: [u8; 6] = [2, 1, 4, 1, 8, 1];

pub const REGION_CART0: usize = 0x8;
pub const REGION_CART0_EX: usize = 0x9;
pub const REGION_CART1: usize = 0xA;
pub const REGION_CART1_EX: usize = 0xB;
pub const REGION_CART2: usize = 0xC;
pub const REGION_CART2_EX: usize = 0xD;
pub const REGION_CART_SRAM: usize = 0xE;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AccessWidth {
    Half,
    Word,
}

/// 4000204h - WAITCNT - Waitstate Control (R/W). Bit 14 (prefetch buffer
/// enable) is decoded but, per spec §4.C, not modeled any further here.
#[derive(IoRegister, Copy, Clone)]
#[field(sram_wait_control: u32 = 0..=1)]
#[field(waitstate_0_first_access: u32 = 2..=3)]
#[field(waitstate_0_second_access: u32 = 4)]
#[field(waitstate_1_first_access: u32 = 5..=6)]
#[field(waitstate_1_second_access: u32 = 7)]
#[field(waitstate_2_first_access: u32 = 8..=9)]
#[field(waitstate_2_second_access: u32 = 10)]
#[field(prefetch_buffer_enabled: bool = 14)]
pub struct RegWaitcnt {
    value: u32,
}

pub struct WaitstateTable {
    non_seq16: [u8; TABLE_LEN],
    seq16: [u8; TABLE_LEN],
    non_seq32: [u8; TABLE_LEN],
    seq32: [u8; TABLE_LEN],
}

impl Default for WaitstateTable {
    fn default() -> Self {
        let mut table = WaitstateTable {
            non_seq16: [0; TABLE_LEN],
            seq16: [0; TABLE_LEN],
            non_seq32: [0; TABLE_LEN],
            seq32: [0; TABLE_LEN],
        };
        for region in 0..BASE_NON_SEQ.len() {
            table.set_region(region, BASE_NON_SEQ[region], BASE_SEQ[region]);
        }
        table
    }
}

impl WaitstateTable {
    fn set_region(&mut self, region: usize, non_seq16: u8, seq16: u8) {
        self.non_seq16[region] = non_seq16;
        self.seq16[region] = seq16;
        self.non_seq32[region] = non_seq16 + 1 + seq16;
        self.seq32[region] = 2 * seq16 + 1;
    }

    #[inline]
    pub fn non_seq(&self, width: AccessWidth, region_index: usize) -> Waitstates {
        Waitstates::from(match width {
            AccessWidth::Word => self.non_seq32[region_index],
            AccessWidth::Half => self.non_seq16[region_index],
        } as u32)
    }

    #[inline]
    pub fn seq(&self, width: AccessWidth, region_index: usize) -> Waitstates {
        Waitstates::from(match width {
            AccessWidth::Word => self.seq32[region_index],
            AccessWidth::Half => self.seq16[region_index],
        } as u32)
    }

    #[inline]
    pub fn cost(&self, width: AccessWidth, access: arm::emu::AccessType, addr: u32) -> Waitstates {
        let idx = (addr >> super::decode::REGION_SHIFT) as usize;
        match access {
            arm::emu::AccessType::NonSequential => self.non_seq(width, idx),
            arm::emu::AccessType::Sequential => self.seq(width, idx),
        }
    }

    /// Recomputes the gamepak/SRAM waitstate entries from a freshly
    /// written WAITCNT value. Both mirror halves of each wait state region
    /// (e.g. `CART0` and `CART0_EX`) always receive identical values.
    pub fn adjust(&mut self, waitcnt: RegWaitcnt) {
        let sram = ROM_NON_SEQ[waitcnt.sram_wait_control() as usize];
        self.set_region(REGION_CART_SRAM, sram, sram);

        let ws0_first = ROM_NON_SEQ[waitcnt.waitstate_0_first_access() as usize];
        let ws0_seq = ROM_SEQ[waitcnt.waitstate_0_second_access() as usize];
        self.set_region(REGION_CART0, ws0_first, ws0_seq);
        self.set_region(REGION_CART0_EX, ws0_first, ws0_seq);

        let ws1_first = ROM_NON_SEQ[waitcnt.waitstate_1_first_access() as usize];
        let ws1_seq = ROM_SEQ[2 + waitcnt.waitstate_1_second_access() as usize];
        self.set_region(REGION_CART1, ws1_first, ws1_seq);
        self.set_region(REGION_CART1_EX, ws1_first, ws1_seq);

        let ws2_first = ROM_NON_SEQ[waitcnt.waitstate_2_first_access() as usize];
        let ws2_seq = ROM_SEQ[4 + waitcnt.waitstate_2_second_access() as usize];
        self.set_region(REGION_CART2, ws2_first, ws2_seq);
        self.set_region(REGION_CART2_EX, ws2_first, ws2_seq);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_matches_hardware_defaults() {
        let table = WaitstateTable::default();
        assert_eq!(u32::from(table.non_seq(AccessWidth::Half, 0x2)), 2);
        assert_eq!(u32::from(table.seq(AccessWidth::Half, 0x2)), 2);
        for region in [0x8, 0x9, 0xA, 0xB, 0xC, 0xD, 0xE] {
            assert_eq!(u32::from(table.non_seq(AccessWidth::Half, region)), 4);
        }
        assert_eq!(u32::from(table.non_seq(AccessWidth::Half, 0x10)), 0);
        assert_eq!(u32::from(table.non_seq(AccessWidth::Half, 0xFF)), 0);
    }

    #[test]
    fn word_cost_is_half_non_seq_plus_one_plus_half_seq() {
        let table = WaitstateTable::default();
        for region in 0..15usize {
            let non_seq16 = u32::from(table.non_seq(AccessWidth::Half, region));
            let seq16 = u32::from(table.seq(AccessWidth::Half, region));
            let non_seq32 = u32::from(table.non_seq(AccessWidth::Word, region));
            let seq32 = u32::from(table.seq(AccessWidth::Word, region));
            assert_eq!(non_seq32, non_seq16 + 1 + seq16);
            assert_eq!(seq32, 2 * seq16 + 1);
        }
    }

    #[test]
    fn adjust_waitstates_decodes_every_field() {
        let mut table = WaitstateTable::default();
        // SRAM=2 (-> 2 cycles), WS0 first=3 (-> 8 cycles), WS0 second=1 (-> 1 cycle).
        let waitcnt = RegWaitcnt::new(0b10 | (0b11 << 2) | (1 << 4));
        table.adjust(waitcnt);
        assert_eq!(u32::from(table.non_seq(AccessWidth::Half, REGION_CART_SRAM)), 2);
        assert_eq!(u32::from(table.non_seq(AccessWidth::Half, REGION_CART0)), 8);
        assert_eq!(u32::from(table.non_seq(AccessWidth::Half, REGION_CART0_EX)), 8);
        assert_eq!(u32::from(table.seq(AccessWidth::Half, REGION_CART0)), 1);
    }
}
