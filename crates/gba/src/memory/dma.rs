//! The four-channel DMA engine (spec §4.E).

use byteorder::{ByteOrder, LittleEndian};
use pyrite_derive::IoRegister;

use super::decode::Region;
use super::error::MemoryError;
use super::waitstate::AccessWidth;
use super::GbaMemory;
use crate::irq::IrqLine;

pub const CHANNEL_COUNT: usize = 4;

/// Per-channel address step table, scaled by the transfer width.
const DMA_OFFSET: [i32; 4] = [1, -1, 0, 1];

const DMA_CNT_HI_OFFSET: [u32; CHANNEL_COUNT] = [0x0BA, 0x0C6, 0x0D2, 0x0DE];

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AddressControl {
    Increment,
    Decrement,
    Fixed,
    IncrementReload,
}

impl From<u16> for AddressControl {
    fn from(value: u16) -> Self {
        match value & 0b11 {
            0 => AddressControl::Increment,
            1 => AddressControl::Decrement,
            2 => AddressControl::Fixed,
            3 => AddressControl::IncrementReload,
            _ => unreachable!(),
        }
    }
}

impl From<AddressControl> for u16 {
    fn from(value: AddressControl) -> Self {
        match value {
            AddressControl::Increment => 0,
            AddressControl::Decrement => 1,
            AddressControl::Fixed => 2,
            AddressControl::IncrementReload => 3,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DmaTiming {
    Immediate,
    VBlank,
    HBlank,
    Special,
}

impl From<u16> for DmaTiming {
    fn from(value: u16) -> Self {
        match value & 0b11 {
            0 => DmaTiming::Immediate,
            1 => DmaTiming::VBlank,
            2 => DmaTiming::HBlank,
            3 => DmaTiming::Special,
            _ => unreachable!(),
        }
    }
}

impl From<DmaTiming> for u16 {
    fn from(value: DmaTiming) -> Self {
        match value {
            DmaTiming::Immediate => 0,
            DmaTiming::VBlank => 1,
            DmaTiming::HBlank => 2,
            DmaTiming::Special => 3,
        }
    }
}

/// 40000BAh+ - DMAxCNT_H - DMA Control (R/W)
#[derive(IoRegister, Copy, Clone)]
#[field(dest_control: AddressControl = 5..=6)]
#[field(src_control: AddressControl = 7..=8)]
#[field(repeat: bool = 9)]
#[field(word_width: bool = 10)]
#[field(drq: bool = 11)]
#[field(timing: DmaTiming = 12..=13)]
#[field(irq: bool = 14)]
#[field(enable: bool = 15)]
pub struct RegDmaControlHi {
    value: u16,
}

/// A single DMA channel's programmed and in-flight state (spec §3).
#[derive(Clone, Copy)]
pub struct DmaChannel {
    pub source: u32,
    pub dest: u32,
    pub count: u32,
    pub next_source: u32,
    pub next_dest: u32,
    pub next_count: u32,
    pub control: RegDmaControlHi,
    /// Signed cycle countdown to the next IRQ; `i32::MAX` encodes "idle".
    pub next_irq: i32,
}

impl Default for DmaChannel {
    fn default() -> Self {
        DmaChannel {
            source: 0,
            dest: 0,
            count: 0,
            next_source: 0,
            next_dest: 0,
            next_count: 0,
            control: RegDmaControlHi::new(0),
            next_irq: i32::MAX,
        }
    }
}

impl DmaChannel {
    #[inline]
    pub fn enable(&self) -> bool {
        self.control.enable()
    }

    #[inline]
    pub fn width(&self) -> u32 {
        if self.control.word_width() {
            4
        } else {
            2
        }
    }

    #[inline]
    pub fn packed(&self) -> u16 {
        u16::from(self.control)
    }
}

impl GbaMemory {
    pub fn write_dma_source_address(&mut self, channel: usize, addr: u32) {
        self.dma[channel].source = addr & !1;
    }

    pub fn write_dma_dest_address(&mut self, channel: usize, addr: u32) {
        self.dma[channel].dest = addr & !1;
    }

    pub fn write_dma_count(&mut self, channel: usize, count: u16) {
        let decoded = if count == 0 {
            if channel == 3 {
                0x10000
            } else {
                0x4000
            }
        } else {
            count as u32
        };
        self.dma[channel].count = decoded;
    }

    /// Writes DMAxCNT_HI, latching cursors and scheduling the transfer on a
    /// 0->1 enable transition. Returns the control value as it now reads
    /// back, since an immediate transfer may complete (and clear `enable`)
    /// synchronously within this call.
    pub fn write_dma_control(&mut self, channel: usize, control16: u16) -> u16 {
        let was_enabled = self.dma[channel].enable();
        self.dma[channel].control = RegDmaControlHi::from(control16);
        self.dma[channel].next_irq = 0;

        if self.dma[channel].control.drq() {
            tracing::warn!(channel, "DMA game pak DRQ requested but not implemented");
        }

        if !was_enabled && self.dma[channel].enable() {
            self.dma[channel].next_source = self.dma[channel].source;
            self.dma[channel].next_dest = self.dma[channel].dest;
            self.dma[channel].next_count = self.dma[channel].count;
            self.schedule_dma(channel);
        }

        self.sync_dma_shadow(channel);
        self.dma[channel].packed()
    }

    fn sync_dma_shadow(&mut self, channel: usize) {
        let offset = DMA_CNT_HI_OFFSET[channel] as usize;
        LittleEndian::write_u16(&mut self.io_shadow[offset..], self.dma[channel].packed());
    }

    /// A 1 KiB mirror of the I/O space the DMA engine writes to directly
    /// (the enable bit, cleared on its own when a non-repeating transfer
    /// finishes); the I/O register file collaborator consults this to
    /// reflect autonomous changes back to the guest.
    pub fn io_shadow_word(&self, offset: u32) -> u16 {
        let offset = (offset & super::decode::IO_MASK & !1) as usize;
        LittleEndian::read_u16(&self.io_shadow[offset..])
    }

    fn schedule_dma(&mut self, channel: usize) {
        match self.dma[channel].control.timing() {
            DmaTiming::Immediate => self.service_dma(channel),
            DmaTiming::HBlank | DmaTiming::VBlank => {
                // Picked up later by `run_hblank_dmas`/`run_vblank_dmas`.
            }
            DmaTiming::Special => match channel {
                0 => {
                    self.last_error = Some(MemoryError::InvalidDmaTiming);
                    tracing::warn!("discarding invalid special-timing schedule on DMA0");
                }
                1 | 2 | 3 => {
                    // Picked up later by `run_fifo_dma`/`run_video_capture_dma`.
                }
                _ => unreachable!(),
            },
        }
    }

    /// Runs every enabled HBlank-timed channel, in ascending channel
    /// order, to completion. Called by the video collaborator.
    pub fn run_hblank_dmas(&mut self) {
        for channel in 0..CHANNEL_COUNT {
            if self.dma[channel].enable() && self.dma[channel].control.timing() == DmaTiming::HBlank {
                self.service_dma(channel);
            }
        }
    }

    /// Runs every enabled VBlank-timed channel, in ascending channel
    /// order, to completion. Called by the video collaborator.
    pub fn run_vblank_dmas(&mut self) {
        for channel in 0..CHANNEL_COUNT {
            if self.dma[channel].enable() && self.dma[channel].control.timing() == DmaTiming::VBlank {
                self.service_dma(channel);
            }
        }
    }

    /// Services channel 1 or 2 if it is armed for special (audio FIFO)
    /// timing. Called by the audio collaborator on FIFO drain.
    pub fn run_fifo_dma(&mut self, channel: usize) {
        debug_assert!(channel == 1 || channel == 2);
        if self.dma[channel].enable() && self.dma[channel].control.timing() == DmaTiming::Special {
            self.service_dma(channel);
        }
    }

    /// Services channel 3 if it is armed for special (video capture)
    /// timing. Called by the video collaborator.
    pub fn run_video_capture_dma(&mut self) {
        if self.dma[3].enable() && self.dma[3].control.timing() == DmaTiming::Special {
            self.service_dma(3);
        }
    }

    /// Runs one DMA channel's transfer to completion. Not preemptable: no
    /// other bus activity is interleaved with the copy loop.
    fn service_dma(&mut self, channel: usize) {
        if !self.dma[channel].enable() {
            return;
        }

        let width = self.dma[channel].width();
        let src_control = self.dma[channel].control.src_control();
        let dst_control = self.dma[channel].control.dest_control();
        let src_offset = DMA_OFFSET[u16::from(src_control) as usize] * width as i32;
        let dst_offset = DMA_OFFSET[u16::from(dst_control) as usize] * width as i32;

        let mut words_remaining = self.dma[channel].next_count;
        let mut source = self.dma[channel].next_source;
        let mut dest = self.dma[channel].next_dest;
        let source_region = Region::table_index(source);
        let dest_region = Region::table_index(dest);

        if width == 4 {
            source &= !3;
            dest &= !3;
            while words_remaining > 0 {
                let (word, _) = self.load32(source, arm::emu::AccessType::NonSequential);
                let _ = self.store32(dest, word, arm::emu::AccessType::NonSequential);
                source = (source as i64 + src_offset as i64) as u32;
                dest = (dest as i64 + dst_offset as i64) as u32;
                words_remaining -= 1;
            }
        } else {
            while words_remaining > 0 {
                let (word, _) = self.load16(source, arm::emu::AccessType::NonSequential);
                let _ = self.store16(dest, word, arm::emu::AccessType::NonSequential);
                source = (source as i64 + src_offset as i64) as u32;
                dest = (dest as i64 + dst_offset as i64) as u32;
                words_remaining -= 1;
            }
        }

        if self.dma[channel].control.irq() {
            let access_width = if width == 4 { AccessWidth::Word } else { AccessWidth::Half };
            let non_seq = self.waitstates.non_seq(access_width, source_region)
                + self.waitstates.non_seq(access_width, dest_region);
            let seq = self.waitstates.seq(access_width, source_region)
                + self.waitstates.seq(access_width, dest_region);
            let count = self.dma[channel].count;
            let delay = 2u32 + u32::from(non_seq) + count.saturating_sub(1) * u32::from(seq);
            self.dma[channel].next_irq = delay as i32;
        }

        self.dma[channel].next_source = source;
        self.dma[channel].next_dest = dest;
        self.dma[channel].next_count = words_remaining;

        if !self.dma[channel].control.repeat() {
            self.dma[channel].control.set_enable(false);
            self.sync_dma_shadow(channel);
        } else {
            self.dma[channel].next_count = self.dma[channel].count;
            if dst_control == AddressControl::IncrementReload {
                self.dma[channel].next_dest = self.dma[channel].dest;
            }
            self.schedule_dma(channel);
        }
    }

    /// DMA portion of the event/tick driver (spec §4.G): advances every
    /// channel's IRQ countdown by `cycles` and raises any that reach zero.
    /// Returns the smallest positive countdown remaining, or the idle
    /// sentinel if none is pending.
    pub fn process_dma_events(&mut self, cycles: i32, irq: &mut dyn crate::irq::InterruptLine) -> i32 {
        let mut horizon = i32::MAX;
        for channel in 0..CHANNEL_COUNT {
            let was_pending = self.dma[channel].next_irq != 0;
            self.dma[channel].next_irq -= cycles;
            if self.dma[channel].control.enable() && self.dma[channel].control.irq() && was_pending {
                if self.dma[channel].next_irq <= 0 {
                    self.dma[channel].next_irq = i32::MAX;
                    irq.raise(IrqLine::dma(channel));
                } else if self.dma[channel].next_irq < horizon {
                    horizon = self.dma[channel].next_irq;
                }
            }
        }
        horizon
    }
}
