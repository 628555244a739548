//! user event generator

use log;

use crate::sim::SchedulingError;
use crate::stimulus::UserEvent;

/// user event generator
/// 
/// holds the validated stimulus list. the scheduler schedules each event's
/// first firing at `init_simulation` and requeues repeats as they fire.
#[derive(Clone, Debug, Default)]
pub struct UserEventGenerator {
    events: Vec<UserEvent>,
}

impl UserEventGenerator {

    pub fn new() -> Self {
        Self::default()
    }

    /// create a generator from a list of events, validating each
    pub fn new_with(events: impl IntoIterator<Item = UserEvent>) -> Result<Self, SchedulingError> {
        let mut generator = Self::new();
        for event in events {
            generator.add(event)?;
        }
        Ok(generator)
    }

    /// validate and add an event, returning its index
    pub fn add(&mut self, event: UserEvent) -> Result<usize, SchedulingError> {
        event.validate()?;
        log::debug!(
            "user event {}: {:?} @ {:#010x} starting at {}",
            self.events.len(), event.kind, event.register_address, event.start_time,
        );
        self.events.push(event);
        Ok(self.events.len() - 1)
    }

    pub fn get(&self, index: usize) -> Option<&UserEvent> {
        self.events.get(index)
    }

    pub fn events(&self) -> &[UserEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
