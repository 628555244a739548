//! flexio module
//! 
//! the i.mx rt flexible i/o block: a configurable set of timers and
//! shifters emulating serial protocols and pwm outputs
//! 
//! see i.mx rt1060 reference manual chapter 50

pub mod config;
pub mod model;
pub mod shifter;
pub mod timer;

pub use config::*;
pub use model::*;
pub use shifter::*;
pub use timer::*;

/// flexio1 base address
pub const FLEXIO1_BASE: u32 = 0x401A_C000;
/// number of shifters in the block
pub const SHIFTER_COUNT: usize = 4;
/// number of timers in the block
pub const TIMER_COUNT: usize = 4;
/// number of flexio pins
pub const PIN_COUNT: usize = 32;
