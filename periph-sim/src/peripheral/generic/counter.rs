//! generic counter
//! 
//! an up-counter that wraps to zero past its overflow value
use log;

use crate::peripheral;
use crate::peripheral::{ PeripheralModel, RegisterFile };
use crate::sim::{ Output, Time, Value, MIN_QUANT };

/// current value
pub const CNT: u32 = 0x00;
/// overflow value
pub const TOP: u32 = 0x04;
/// prescaler
pub const PSC: u32 = 0x08;

static OUTPUT_NAMES: &[&str] = &["CURRENT_VALUE", "OVERFLOW_OCCURRED"];

/// generic counter model
/// 
/// increments once per `prescaler / clock_freq` seconds. the overflow
/// output is true only for the update that wrapped the counter.
#[derive(Clone, Debug)]
pub struct CounterModel {
    regs: RegisterFile,
    start: u32,
    clock_freq: f64,
    tick_period: Time,
    overflowed: bool,
}

impl CounterModel {

    pub fn new_with(
        overflow: u32,
        start: u32,
        clock_freq: f64,
        prescaler: u32,
    ) -> Result<Self, peripheral::Error> {
        if !(clock_freq.is_finite() && clock_freq > 0.0) {
            return Err(peripheral::Error::configuration(
                format!("counter clock frequency must be positive, got {clock_freq}")));
        }
        if start > overflow {
            return Err(peripheral::Error::configuration(
                format!("counter start {start} exceeds overflow value {overflow}")));
        }
        let tick_period = Self::period(clock_freq, prescaler)?;

        let mut regs = RegisterFile::new();
        regs.define(CNT, 32, start, false)
            .define(TOP, 32, overflow, false)
            .define(PSC, 32, prescaler, false);

        Ok(Self { regs, start, clock_freq, tick_period, overflowed: false })
    }

    fn period(clock_freq: f64, prescaler: u32) -> Result<Time, peripheral::Error> {
        if prescaler == 0 {
            return Err(peripheral::Error::configuration("counter prescaler must be at least 1"));
        }
        let period = prescaler as f64 / clock_freq;
        if period < MIN_QUANT {
            return Err(peripheral::Error::configuration(
                format!("counter tick period {period} is below the time resolution")));
        }
        Ok(period)
    }

    fn reg(&self, address: u32) -> u32 {
        self.regs.get(address).map_or(0, |reg| reg.value)
    }

    pub fn current_value(&self) -> u32 {
        self.reg(CNT)
    }

    pub fn overflow_value(&self) -> u32 {
        self.reg(TOP)
    }

    pub fn prescaler(&self) -> u32 {
        self.reg(PSC)
    }

    /// true only if the most recent update wrapped the counter
    pub fn overflow_occurred(&self) -> bool {
        self.overflowed
    }

    pub fn tick_period(&self) -> Time {
        self.tick_period
    }
}

impl PeripheralModel for CounterModel {

    fn name(&self) -> &str {
        "counter"
    }

    fn initialize(&mut self, now: Time) -> Result<Option<Time>, peripheral::Error> {
        self.regs.force(CNT, self.start)?;
        self.overflowed = false;
        log::debug!("counter initialized at {} with tick period {}", self.start, self.tick_period);
        Ok(Some(now + self.tick_period))
    }

    fn update(&mut self, now: Time) -> Result<Option<Time>, peripheral::Error> {
        let next = self.current_value() as u64 + 1;
        self.overflowed = next > self.overflow_value() as u64;
        let value = if self.overflowed { 0 } else { next as u32 };
        self.regs.force(CNT, value)?;
        Ok(Some(now + self.tick_period))
    }

    fn output_names(&self) -> &'static [&'static str] {
        OUTPUT_NAMES
    }

    fn outputs(&self) -> Vec<Output> {
        vec![
            Output::new_with("CURRENT_VALUE", Value::Int(self.current_value() as u64)),
            Output::new_with("OVERFLOW_OCCURRED", Value::Bool(self.overflowed)),
        ]
    }

    fn read_register(&self, address: u32) -> Result<u32, peripheral::Error> {
        Ok(self.regs.read(address)?)
    }

    fn write_register(&mut self, address: u32, value: u32) -> Result<(), peripheral::Error> {
        if address == PSC {
            self.tick_period = Self::period(self.clock_freq, value)?;
        }
        Ok(self.regs.write(address, value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peripheral::RegisterAccessError;

    #[test]
    fn test_counter_wraps() {
        env_logger::try_init().ok();
        let mut counter = CounterModel::new_with(3, 2, 1.0, 1)
            .expect("failed to create counter");

        assert_eq!(counter.initialize(0.0).expect("failed to initialize"), Some(1.0));
        assert_eq!(counter.update(1.0).expect("failed to update"), Some(2.0));
        assert_eq!(counter.current_value(), 3);
        assert!(!counter.overflow_occurred());

        counter.update(2.0).expect("failed to update");
        assert_eq!(counter.current_value(), 0);
        assert!(counter.overflow_occurred());

        counter.update(3.0).expect("failed to update");
        assert_eq!(counter.current_value(), 1);
        assert!(!counter.overflow_occurred());
    }

    #[test]
    fn test_counter_prescaler() {
        let mut counter = CounterModel::new_with(10, 0, 8.0, 2)
            .expect("failed to create counter");
        assert_eq!(counter.tick_period(), 0.25);

        counter.write_register(PSC, 4).expect("failed to write prescaler");
        assert_eq!(counter.tick_period(), 0.5);
        assert_eq!(counter.update(1.0).expect("failed to update"), Some(1.5));

        let err = counter.write_register(PSC, 0).expect_err("zero prescaler accepted");
        assert!(matches!(err, peripheral::Error::Configuration(_)));
        assert_eq!(counter.prescaler(), 4);
    }

    #[test]
    fn test_counter_invalid_construction() {
        assert!(CounterModel::new_with(3, 4, 1.0, 1).is_err());
        assert!(CounterModel::new_with(3, 0, 0.0, 1).is_err());
        assert!(CounterModel::new_with(3, 0, 1.0, 0).is_err());
    }

    #[test]
    fn test_counter_unknown_register() {
        let counter = CounterModel::new_with(3, 0, 1.0, 1)
            .expect("failed to create counter");
        let err = counter.read_register(0x0C).expect_err("unknown register read");
        assert_eq!(err, peripheral::Error::RegisterAccess(RegisterAccessError::Unknown(0x0C)));
        assert_eq!(counter.output_index("OVERFLOW_OCCURRED"), Some(1));
    }
}
