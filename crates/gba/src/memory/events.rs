//! Event/tick driver (spec §4.G): called by the CPU scheduler between
//! execution batches to advance pending DMA completion IRQs.

use super::GbaMemory;
use crate::irq::InterruptLine;

/// Sentinel returned when no DMA IRQ is currently pending.
pub const NO_PENDING_IRQ: i32 = i32::MAX;

impl GbaMemory {
    /// Advances every channel's `nextIrq` countdown by `cycles`, raising any
    /// that reach zero through `irq`, and returns the smallest positive
    /// countdown remaining (or [`NO_PENDING_IRQ`] if none is pending).
    ///
    /// Calling this twice with `c1` then `c2` and no intervening mutation
    /// produces the same sequence of raised IRQs as a single call with
    /// `c1 + c2`, since the countdown is a plain linear subtraction.
    pub fn process_events(&mut self, cycles: i32, irq: &mut dyn InterruptLine) -> i32 {
        self.process_dma_events(cycles, irq)
    }
}
