//! simulation errors

use thiserror::Error;
use anyhow;

use crate::peripheral;
use super::channel;
use super::Time;

/// invalid event timing
#[derive(Clone, Debug, Error, PartialEq)]
pub enum SchedulingError {
    #[error("event time {0} is not finite")]
    NonFinite(f64),
    #[error("event time {requested} is earlier than current time {now}")]
    InPast { requested: Time, now: Time },
    #[error("rescheduled event at {next} does not advance past current time {now}")]
    Stalled { next: Time, now: Time },
    #[error("repeating event has negative period {0}")]
    NegativePeriod(f64),
    #[error("event targets model `{target}` but `{installed}` is installed")]
    TargetMismatch { target: String, installed: String },
    #[error("event requires a peripheral model but none is installed")]
    NoModel,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("simulation time: {1} | scheduling error: {0}")]
    Scheduling(SchedulingError, Time),
    #[error("simulation time: {1} | peripheral error: {0}")]
    Peripheral(peripheral::Error, Time),
    #[error("simulation time: {1} | callback error: {0}")]
    Callback(anyhow::Error, Time),
    #[error(transparent)]
    Channel(#[from] channel::Error),
}

impl Error {
    /// the scheduling error carried by this error, if any
    pub fn as_scheduling(&self) -> Option<&SchedulingError> {
        match self {
            Self::Scheduling(err, _) => Some(err),
            _ => None,
        }
    }

    /// the peripheral error carried by this error, if any
    pub fn as_peripheral(&self) -> Option<&peripheral::Error> {
        match self {
            Self::Peripheral(err, _) => Some(err),
            _ => None,
        }
    }
}
