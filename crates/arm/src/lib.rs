#[cfg(feature = "arm-emulator")]
pub use arm_emulator as emu;
