//! simulation configuration

use std::time::Duration;

use serde::{ Deserialize, Serialize };

/// scheduler configuration
/// 
/// passed explicitly at construction; nothing here is process-global
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// real-time delay applied by the output channel after each step,
    /// for human-visible playback. zero disables pacing.
    #[serde(default)]
    pub playback_delay_ms: u64,
    /// safety cap on iterations for `RunBound::Unbounded` runs
    #[serde(default)]
    pub step_limit: Option<u64>,
}

impl Config {
    pub fn playback_delay(&self) -> Duration {
        Duration::from_millis(self.playback_delay_ms)
    }
}
