//! simulation types
//! 
//! various types used across the simulation module

use std::fmt;

/// simulated time in seconds
pub type Time = f64;

/// a single output value reported by a peripheral model
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    Int(u64),
}

impl Value {
    /// interpret the value as a logic level
    pub fn as_bool(&self) -> bool {
        match self {
            Self::Bool(level) => *level,
            Self::Int(value) => *value != 0,
        }
    }

    /// interpret the value as an integer
    pub fn as_int(&self) -> u64 {
        match self {
            Self::Bool(level) => *level as u64,
            Self::Int(value) => *value,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(level) => write!(f, "{}", *level as u8),
            Self::Int(value) => write!(f, "{value}"),
        }
    }
}

/// a named output of a peripheral model
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Output {
    pub name: &'static str,
    pub value: Value,
}

impl Output {
    pub fn new_with(name: &'static str, value: Value) -> Self {
        Self { name, value }
    }
}

/// the outputs of one executed scheduler iteration
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    pub time: Time,
    pub outputs: Vec<Output>,
}

impl Sample {
    /// look up an output value by name
    pub fn get(&self, name: &str) -> Option<Value> {
        self.outputs.iter()
            .find(|output| output.name == name)
            .map(|output| output.value)
    }
}

/// execution bound for a call to `Scheduler::start_simulation`
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RunBound {
    /// execute at most this many iterations
    Steps(u64),
    /// execute events up to and including this absolute time
    Until(Time),
    /// run until the event set is exhausted (subject to `Config::step_limit`)
    Unbounded,
}

/// the reason a call to `Scheduler::start_simulation` returned
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Halt {
    /// the requested number of iterations executed
    StepLimit,
    /// the next pending event lies beyond the time ceiling
    TimeLimit,
    /// no events are pending
    Exhausted,
    /// a pause was requested
    Paused,
    /// a stop was requested through the control handle
    Stopped,
}
