//! BIOS high-level emulation (spec §4.F): the handful of software-interrupt
//! services implemented directly rather than by executing real BIOS code.

use super::decode::Region;
use super::GbaMemory;

/// Target of an LZ77 decompression, selecting which backing store the
/// decoder writes into (and, implicitly, that store's wraparound size).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Lz77Target {
    Wram,
    Vram,
}

impl GbaMemory {
    /// Dispatches a 16-bit `SWI` immediate. `Halt` (0x02) is the CPU
    /// collaborator's concern and is not handled here.
    pub fn swi(&mut self, immediate: u8, regs: &mut dyn SwiRegisters) {
        match immediate {
            0x0B => self.cpu_set(regs),
            0x0C => self.fast_cpu_set(regs),
            0x11 => self.lz77_decompress(regs, Lz77Target::Wram),
            0x12 => self.lz77_decompress(regs, Lz77Target::Vram),
            0x1F => self.midi_key_to_freq(regs),
            0x02 => {}
            other => {
                tracing::debug!(immediate = other, "unhandled SWI immediate");
            }
        }
    }

    /// Dispatches a 32-bit `SWI` immediate. Per the original BIOS, this
    /// shifts the immediate right by 16 bits and delegates to the 16-bit
    /// dispatcher — an apparent off-by-one in the reference firmware,
    /// preserved here rather than corrected.
    pub fn swi32(&mut self, immediate: u32, regs: &mut dyn SwiRegisters) {
        self.swi((immediate >> 16) as u8, regs);
    }

    fn cpu_set(&mut self, regs: &mut dyn SwiRegisters) {
        let source = regs.r0();
        let dest = regs.r1();
        let mode = regs.r2();
        let count = mode & 0x000F_FFFF;
        let fill = mode & (1 << 24) != 0;
        let word_width = mode & (1 << 26) != 0;

        if word_width {
            let source = source & !3;
            let dest = dest & !3;
            if fill {
                let (value, _) = self.load32(source, arm::emu::AccessType::NonSequential);
                for i in 0..count {
                    let _ = self.store32(dest + i * 4, value, arm::emu::AccessType::NonSequential);
                }
            } else {
                for i in 0..count {
                    let (value, _) = self.load32(source + i * 4, arm::emu::AccessType::NonSequential);
                    let _ = self.store32(dest + i * 4, value, arm::emu::AccessType::NonSequential);
                }
            }
        } else {
            let source = source & !1;
            let dest = dest & !1;
            if fill {
                let (value, _) = self.load16(source, arm::emu::AccessType::NonSequential);
                for i in 0..count {
                    let _ = self.store16(dest + i * 2, value, arm::emu::AccessType::NonSequential);
                }
            } else {
                for i in 0..count {
                    let (value, _) = self.load16(source + i * 2, arm::emu::AccessType::NonSequential);
                    let _ = self.store16(dest + i * 2, value, arm::emu::AccessType::NonSequential);
                }
            }
        }
    }

    fn fast_cpu_set(&mut self, regs: &mut dyn SwiRegisters) {
        let source = regs.r0() & !3;
        let dest = regs.r1() & !3;
        let mode = regs.r2();
        let count = (mode & 0x000F_FFFF).div_ceil(8) * 8;
        let fill = mode & (1 << 24) != 0;

        if fill {
            let (value, _) = self.load32(source, arm::emu::AccessType::NonSequential);
            for i in 0..count {
                let _ = self.store32(dest + i * 4, value, arm::emu::AccessType::NonSequential);
            }
        } else {
            for i in 0..count {
                let (value, _) = self.load32(source + i * 4, arm::emu::AccessType::NonSequential);
                let _ = self.store32(dest + i * 4, value, arm::emu::AccessType::NonSequential);
            }
        }
    }

    fn midi_key_to_freq(&mut self, regs: &mut dyn SwiRegisters) {
        let info_struct = regs.r0();
        let (key, _) = self.load32(info_struct + 4, arm::emu::AccessType::NonSequential);
        let fine_adjust = regs.r1() as f64;
        let semitone_fraction = regs.r2() as f64 / 256.0;
        let exponent = (180.0 - fine_adjust - semitone_fraction) / 12.0;
        let frequency = key as f64 / 2f64.powf(exponent);
        regs.set_r0(frequency as u32);
    }

    fn lz77_decompress(&mut self, regs: &mut dyn SwiRegisters, target: Lz77Target) {
        let mut source = regs.r0();
        let dest_base = regs.r1();

        let (header, _) = self.load32(source, arm::emu::AccessType::NonSequential);
        source += 4;
        let total_len = (header >> 8) as usize;

        let dest_mask = match target {
            Lz77Target::Wram => super::decode::WRAM_MASK,
            Lz77Target::Vram => super::decode::VRAM_MASK,
        };

        let mut dest_index: usize = 0;
        let mut written = 0usize;

        'outer: while written < total_len {
            let (flags, _) = self.load8(source, arm::emu::AccessType::NonSequential);
            source += 1;

            for bit in (0..8).rev() {
                if written >= total_len {
                    break 'outer;
                }

                if flags & (1 << bit) == 0 {
                    let (literal, _) = self.load8(source, arm::emu::AccessType::NonSequential);
                    source += 1;
                    self.write_lz77_byte(target, dest_base, dest_index, dest_mask, literal);
                    dest_index += 1;
                    written += 1;
                } else {
                    let (byte_a, _) = self.load8(source, arm::emu::AccessType::NonSequential);
                    let (byte_b, _) = self.load8(source + 1, arm::emu::AccessType::NonSequential);
                    source += 2;

                    let length = (byte_a >> 4) as usize + 3;
                    let disp = (((byte_a as u32 & 0xF) << 8) | byte_b as u32) as usize + 1;

                    for _ in 0..length {
                        if written >= total_len {
                            break;
                        }
                        let back_index = (dest_index + dest_mask as usize + 1 - disp) % (dest_mask as usize + 1);
                        let back_byte = self.read_lz77_byte(target, dest_base, back_index, dest_mask);
                        self.write_lz77_byte(target, dest_base, dest_index, dest_mask, back_byte);
                        dest_index += 1;
                        written += 1;
                    }
                }
            }
        }
    }

    fn write_lz77_byte(&mut self, target: Lz77Target, base: u32, index: usize, mask: u32, value: u8) {
        let offset = (index as u32) & mask;
        match target {
            Lz77Target::Wram => {
                let (_, o) = super::decode::decode(base.wrapping_add(offset), self.rom_mask, super::decode::SRAM_MASK);
                self.wram[o as usize] = value;
            }
            Lz77Target::Vram => self.video.write_vram_byte_raw(offset, value),
        }
    }

    fn read_lz77_byte(&self, target: Lz77Target, base: u32, index: usize, mask: u32) -> u8 {
        let offset = (index as u32) & mask;
        match target {
            Lz77Target::Wram => {
                let (_, o) = super::decode::decode(base.wrapping_add(offset), self.rom_mask, super::decode::SRAM_MASK);
                self.wram[o as usize]
            }
            Lz77Target::Vram => self.video.read_vram_byte_raw(offset),
        }
    }
}

/// Guest register access the BIOS HLE routines need: argument registers r0-r2
/// and a place to store a return value. Owned by the CPU collaborator.
pub trait SwiRegisters {
    fn r0(&self) -> u32;
    fn r1(&self) -> u32;
    fn r2(&self) -> u32;
    fn set_r0(&mut self, value: u32);
}

/// Classifies an address by whether it lies in cartridge ROM, purely to give
/// `lz77_decompress`'s documentation something concrete to point at; the
/// decoder itself only ever targets WRAM or VRAM.
#[allow(dead_code)]
fn is_rom(region: Region) -> bool {
    region.is_cart()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeRegs {
        r0: u32,
        r1: u32,
        r2: u32,
    }

    impl SwiRegisters for FakeRegs {
        fn r0(&self) -> u32 {
            self.r0
        }
        fn r1(&self) -> u32 {
            self.r1
        }
        fn r2(&self) -> u32 {
            self.r2
        }
        fn set_r0(&mut self, value: u32) {
            self.r0 = value;
        }
    }

    #[test]
    fn midi_key_to_freq_matches_reference_formula() {
        let mut mem = GbaMemory::new().unwrap();
        let info_addr = 0x0300_0000;
        let _ = mem.store32(info_addr + 4, 440, arm::emu::AccessType::NonSequential);
        let mut regs = FakeRegs { r0: info_addr, r1: 0, r2: 0 };
        mem.midi_key_to_freq(&mut regs);
        let expected = (440.0 / 2f64.powf(180.0 / 12.0)) as u32;
        assert_eq!(regs.r0, expected);
    }

    #[test]
    fn cpu_set_fill_32bit_writes_every_slot() {
        let mut mem = GbaMemory::new().unwrap();
        let _ = mem.store32(0x0300_0000, 0xAA55_AA55, arm::emu::AccessType::NonSequential);
        let mut regs = FakeRegs {
            r0: 0x0300_0000,
            r1: 0x0300_0100,
            r2: (1 << 24) | (1 << 26) | 8,
        };
        mem.swi(0x0B, &mut regs);
        for i in 0..8u32 {
            let (word, _) = mem.load32(0x0300_0100 + i * 4, arm::emu::AccessType::NonSequential);
            assert_eq!(word, 0xAA55_AA55);
        }
    }
}
