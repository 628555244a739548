//! simulation traits
//! 
//! defines the boundary between the scheduler and whatever consumes
//! its per-step results (trace viewers, loggers, tests)

use crate::sim;
use crate::sim::{ Output, Time };

/// output consumer trait
/// 
/// the consumer is invoked exactly once per executed scheduler iteration
/// with the simulated time and the installed model's outputs, in the
/// order given by the model's `output_names`
pub trait OutputConsumer {
    fn consume(&mut self, time: Time, outputs: &[Output]) -> Result<(), sim::Error>;
}

impl<F> OutputConsumer for F
where
    F: FnMut(Time, &[Output]),
{
    fn consume(&mut self, time: Time, outputs: &[Output]) -> Result<(), sim::Error> {
        self(time, outputs);
        Ok(())
    }
}
