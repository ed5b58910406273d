mod clock;
mod memory;

pub use clock::{Cycles, Waitstates};
pub use memory::{AccessType, Memory};
