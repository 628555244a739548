//! cortex-m peripherals
//! 
//! based on armv7-m architecture reference manual DDI0403E

pub mod systick;
pub use systick::SysTickTimerModel;

/// base of the system control space
pub const SCS_BASE: u32 = 0xE000_E000;
