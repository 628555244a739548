//! channel logger module
//! 

use std::sync::mpsc;

use crate::sim::{ Sample, Time, Value };

/// a logger for channel samples
pub struct ChannelLogger {
    log: Vec<Sample>,
    rx: mpsc::Receiver<Sample>,
}

impl ChannelLogger {
    
    pub fn new_with(rx: mpsc::Receiver<Sample>) -> Self {
        Self {
            log: Vec::new(),
            rx,
        }
    }

    /// get a slice of the current log
    pub fn log(&self) -> &[Sample] {
        &self.log
    }

    /// collect pending samples into the log
    pub fn collect_pending(&mut self) {
        self.log.extend(self.rx.try_iter());
    }

    /// collect the pending samples into the log and
    /// return a string representing the collected samples
    pub fn display_pending(&mut self) -> String {
        let mut log = String::new();
        for sample in self.rx.try_iter() {
            let row = sample.outputs.iter()
                .map(|output| format!("{}={}", output.name, output.value))
                .collect::<Vec<_>>()
                .join(" ");
            log = format!("{log}\n{:.9} {row}", sample.time);
            self.log.push(sample);
        }
        log
    }

    /// the logged history of a single named output
    pub fn values(&self, name: &str) -> Vec<(Time, Value)> {
        self.log.iter()
            .filter_map(|sample| sample.get(name).map(|value| (sample.time, value)))
            .collect()
    }
}
