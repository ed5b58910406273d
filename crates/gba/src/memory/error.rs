use std::fmt;

/// The three error kinds the memory entity can raise. `OutOfMemory` is
/// terminal (construction fails outright); the other two are non-fatal and
/// only recorded as diagnostic state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryError {
    OutOfMemory,
    CartridgeUnmapped,
    InvalidDmaTiming,
}

impl MemoryError {
    pub const fn errno(self) -> u32 {
        match self {
            MemoryError::OutOfMemory => 1,
            MemoryError::CartridgeUnmapped => 2,
            MemoryError::InvalidDmaTiming => 3,
        }
    }

    pub const fn message(self) -> &'static str {
        match self {
            MemoryError::OutOfMemory => "could not allocate backing storage",
            MemoryError::CartridgeUnmapped => "cartridge ROM access while no ROM is loaded",
            MemoryError::InvalidDmaTiming => "special-timing schedule on DMA channel 0 is invalid",
        }
    }
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for MemoryError {}
