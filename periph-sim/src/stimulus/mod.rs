//! stimulus module
//! 
//! user events mutate peripheral registers at scheduled simulated times.
//! the generator validates them and the scheduler fires them.

pub mod event;
pub mod generator;

pub use event::*;
pub use generator::*;
