//! peripheral errors

use std::fmt;

use thiserror::Error;

/// unknown register address, or write to a read-only register
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RegisterAccessError {
    #[error("access to unknown register @ {0:#010x}")]
    Unknown(u32),
    #[error("write to read-only register @ {0:#010x}")]
    ReadOnly(u32),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    RegisterAccess(#[from] RegisterAccessError),
    #[error("configuration error: {0}")]
    Configuration(String),
    /// a legally encoded mode that is not modeled. never fatal: the
    /// affected unit stays inert
    #[error("unsupported {unit} mode {encoding:#05b}")]
    UnsupportedMode { unit: &'static str, encoding: u32 },
}

impl Error {
    /// create a configuration error with the given message
    pub fn configuration(msg: impl fmt::Display) -> Self {
        Self::Configuration(msg.to_string())
    }
}
