//! The interrupt controller is an external collaborator (spec §1): this
//! crate only ever calls into it to raise a line, never to mask or query one.

/// One of the interrupt lines this crate can raise. Only the DMA lines are
/// ever produced here; the rest of the interrupt map belongs to collaborators
/// outside this crate's scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqLine {
    Dma0,
    Dma1,
    Dma2,
    Dma3,
}

impl IrqLine {
    pub(crate) fn dma(channel: usize) -> IrqLine {
        match channel {
            0 => IrqLine::Dma0,
            1 => IrqLine::Dma1,
            2 => IrqLine::Dma2,
            3 => IrqLine::Dma3,
            _ => unreachable!("DMA channel index out of range"),
        }
    }
}

/// Raises interrupt lines. Implemented by the interrupt controller
/// collaborator; this crate only ever calls [`InterruptLine::raise`].
pub trait InterruptLine {
    fn raise(&mut self, line: IrqLine);
}

/// No-op interrupt sink, useful for tests and for hosts that have not wired
/// up an interrupt controller yet.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullInterruptLine;

impl InterruptLine for NullInterruptLine {
    fn raise(&mut self, _line: IrqLine) {}
}
