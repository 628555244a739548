//! peripheral module
//! 
//! defines the peripheral model contract, the register storage backing
//! every model, and the generic (architecture-independent) models

pub mod error;
pub mod generic;
pub mod register_file;
pub mod traits;

pub use error::*;
pub use register_file::*;
pub use traits::*;
