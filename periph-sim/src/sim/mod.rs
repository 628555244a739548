//! simulation module
//! 
//! the simulation module contains the discrete-event scheduler and
//! the types it shares with peripheral models and output consumers

pub mod channel;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::*;
pub use scheduler::*;
pub use traits::*;
pub use types::*;

/// global minimum simulation time resolution in seconds
/// 
/// peripheral tick periods shorter than this are rejected at construction
pub const MIN_QUANT: f64 = 1e-12;
