//! channel module
//! 
//! implements an output channel that broadcasts every executed step
//! to any number of receivers

use std::sync::mpsc;
use std::thread;

use crate::sim;
use crate::sim::{ Config, Output, OutputConsumer, Sample, Time };

pub mod error;
pub use error::Error;
pub mod logger;
pub use logger::ChannelLogger;

/// a channel for simulation samples
/// 
/// acts as a broadcaster: each sample emitted is delivered to every
/// registered receiver. the channel is an `OutputConsumer`, so it can be
/// installed directly into a scheduler.
/// 
/// receivers should be registered using a mspc::Sender
pub struct Channel {
    config: Config,
    receivers: Vec<mpsc::Sender<Sample>>,
}

impl Channel {
    /// create a new channel with the given configuration
    /// 
    /// the configuration's playback delay is applied after each sample
    pub fn new_with(config: Config) -> Self {
        Self {
            config,
            receivers: Vec::new(),
        }
    }

    /// get shared reference to channel's configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// create a channel logger
    pub fn get_logger(&mut self) -> ChannelLogger {
        ChannelLogger::new_with(self.receiver())
    }

    /// emit a reference to a sample to all receivers
    pub fn emit(&self, sample: &Sample) -> Result<(), sim::Error> {
        for tx in self.receivers.iter() {
            tx.send(sample.clone()).map_err(|err| Error::emit("sample", err))?;
        }
        Ok(())
    }

    /// add a receiver by registering a mspc::Sender
    /// and returning a mpsc::Receiver
    pub fn receiver(&mut self) -> mpsc::Receiver<Sample> {
        let (tx, rx) = mpsc::channel();
        self.receivers.push(tx);
        rx
    }
}

impl OutputConsumer for Channel {
    fn consume(&mut self, time: Time, outputs: &[Output]) -> Result<(), sim::Error> {
        self.emit(&Sample { time, outputs: outputs.to_vec() })?;

        let delay = self.config.playback_delay();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::Value;

    #[test]
    fn test_channel_broadcast() {
        let mut channel = Channel::new_with(Config::default());
        let mut first = channel.get_logger();
        let mut second = channel.get_logger();

        let outputs = [Output::new_with("PIN", Value::Bool(true))];
        channel.consume(1.5, &outputs).expect("failed to emit sample");
        channel.consume(2.5, &outputs).expect("failed to emit sample");

        first.collect_pending();
        second.collect_pending();
        assert_eq!(first.log().len(), 2);
        assert_eq!(first.log(), second.log());
        assert_eq!(first.log()[1].time, 2.5);
        assert_eq!(first.values("PIN"), vec![(1.5, Value::Bool(true)), (2.5, Value::Bool(true))]);
    }

    #[test]
    fn test_channel_dropped_receiver() {
        let mut channel = Channel::new_with(Config::default());
        drop(channel.receiver());

        let err = channel.consume(0.0, &[])
            .expect_err("emit to a dropped receiver should fail");
        assert!(matches!(err, sim::Error::Channel(Error::Emit(_, _))));
    }
}
