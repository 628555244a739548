//! nxp peripherals

pub mod flexio;
