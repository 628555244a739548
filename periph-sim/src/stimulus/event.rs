//! user events

use serde::{ Deserialize, Serialize };

use crate::sim::{ SchedulingError, Time };

/// register mutation applied by a user event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MutationKind {
    SetBit,
    ClearBit,
    ToggleBit,
    WriteValue,
}

impl MutationKind {
    /// compute the new register value from the current one
    pub fn apply(self, current: u32, mask: u32, value: u32) -> u32 {
        match self {
            Self::SetBit => current | mask,
            Self::ClearBit => current & !mask,
            Self::ToggleBit => current ^ mask,
            Self::WriteValue => value,
        }
    }
}

/// remaining firings of a scheduled user event after the current one
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Repeats {
    Remaining(u32),
    Forever,
}

impl Repeats {
    /// the repeat state of the following firing, `None` if this was the last
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Remaining(0) => None,
            Self::Remaining(n) => Some(Self::Remaining(n - 1)),
            Self::Forever => Some(Self::Forever),
        }
    }
}

/// a register-mutation stimulus
/// 
/// `period <= 0` marks a one-shot event. with `period > 0`, the event
/// repeats `repeat_count` more times after its first firing, or forever
/// when `repeat_count <= 0`.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct UserEvent {
    pub start_time: Time,
    #[serde(default)]
    pub period: Time,
    #[serde(default)]
    pub repeat_count: i64,
    /// name of the model this event targets. empty matches any model
    #[serde(default)]
    pub target: String,
    pub kind: MutationKind,
    pub register_address: u32,
    #[serde(default)]
    pub bit_position: u8,
    #[serde(default)]
    pub value: u32,
}

impl UserEvent {
    /// create a one-shot event
    pub fn new_with(start_time: Time, kind: MutationKind, register_address: u32) -> Self {
        Self {
            start_time,
            period: 0.0,
            repeat_count: 0,
            target: String::new(),
            kind,
            register_address,
            bit_position: 0,
            value: 0,
        }
    }

    /// repeat the event every `period` seconds
    pub fn every(mut self, period: Time, repeat_count: i64) -> Self {
        self.period = period;
        self.repeat_count = repeat_count;
        self
    }

    pub fn bit(mut self, bit_position: u8) -> Self {
        self.bit_position = bit_position;
        self
    }

    pub fn value(mut self, value: u32) -> Self {
        self.value = value;
        self
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    pub fn is_one_shot(&self) -> bool {
        self.period <= 0.0
    }

    /// repeat state after the first firing
    pub fn repeats(&self) -> Repeats {
        if self.is_one_shot() {
            Repeats::Remaining(0)
        } else if self.repeat_count <= 0 {
            Repeats::Forever
        } else {
            Repeats::Remaining(u32::try_from(self.repeat_count).unwrap_or(u32::MAX))
        }
    }

    /// check the event's timing
    pub fn validate(&self) -> Result<(), SchedulingError> {
        if !self.start_time.is_finite() {
            return Err(SchedulingError::NonFinite(self.start_time));
        }
        if self.start_time < 0.0 {
            return Err(SchedulingError::InPast { requested: self.start_time, now: 0.0 });
        }
        if !self.period.is_finite() {
            return Err(SchedulingError::NonFinite(self.period));
        }
        if self.period < 0.0 && self.repeat_count > 0 {
            return Err(SchedulingError::NegativePeriod(self.period));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutation_kinds() {
        let mask = 1 << 3;
        assert_eq!(MutationKind::SetBit.apply(0b0001, mask, 0), 0b1001);
        assert_eq!(MutationKind::ClearBit.apply(0b1001, mask, 0), 0b0001);
        assert_eq!(MutationKind::ToggleBit.apply(0b1001, mask, 0), 0b0001);
        assert_eq!(MutationKind::ToggleBit.apply(0b0001, mask, 0), 0b1001);
        assert_eq!(MutationKind::WriteValue.apply(0b0001, mask, 0xAA), 0xAA);
    }

    #[test]
    fn test_repeat_encoding() {
        let event = UserEvent::new_with(0.5, MutationKind::ToggleBit, 0x0);
        assert!(event.is_one_shot());
        assert_eq!(event.repeats(), Repeats::Remaining(0));
        assert_eq!(event.repeats().next(), None);

        let event = event.every(1.5, 2);
        assert_eq!(event.repeats(), Repeats::Remaining(2));

        let event = event.every(1.5, 0);
        assert_eq!(event.repeats(), Repeats::Forever);
        assert_eq!(Repeats::Forever.next(), Some(Repeats::Forever));

        // a non-positive period is one-shot whatever the repeat count says
        let event = event.every(0.0, 5);
        assert_eq!(event.repeats(), Repeats::Remaining(0));
    }

    #[test]
    fn test_event_validation() {
        let event = UserEvent::new_with(1.0, MutationKind::SetBit, 0x0);
        assert_eq!(event.validate(), Ok(()));

        let bad = UserEvent::new_with(f64::NAN, MutationKind::SetBit, 0x0);
        assert!(matches!(bad.validate(), Err(SchedulingError::NonFinite(_))));

        let bad = UserEvent::new_with(-1.0, MutationKind::SetBit, 0x0);
        assert!(matches!(bad.validate(), Err(SchedulingError::InPast { .. })));

        let bad = event.clone().every(f64::INFINITY, 1);
        assert!(matches!(bad.validate(), Err(SchedulingError::NonFinite(_))));

        let bad = event.clone().every(-1.0, 3);
        assert_eq!(bad.validate(), Err(SchedulingError::NegativePeriod(-1.0)));

        // negative period without repeats is just a one-shot
        assert_eq!(event.every(-1.0, 0).validate(), Ok(()));
    }
}
