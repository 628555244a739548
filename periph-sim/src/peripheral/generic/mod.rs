//! generic peripherals
//! 
//! architecture-independent peripheral models

pub mod counter;
pub use counter::CounterModel;
