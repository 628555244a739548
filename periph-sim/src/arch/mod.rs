//! architecture-specific peripherals

pub mod cortex_m;
pub mod nxp;
