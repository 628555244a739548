//! flexio peripheral model
//! 
//! composes the flexio timers and shifters into a peripheral model that
//! simulates one pwm timer and one uart (a baud/bit timer with its
//! transmit and receive shifters)
use log;

use crate::peripheral;
use crate::peripheral::{ PeripheralModel, RegisterAccessError };
use crate::sim::{ Output, Time, Value, MIN_QUANT };
use super::{
    Ctrl, Edge, FlexIOConfig, FlexIOShifter, FlexIOTimer, InputSource, RegisterId,
    ShifterMode, TimerMode, PIN_COUNT, SHIFTER_COUNT, TIMER_COUNT,
};

static OUTPUT_NAMES: &[&str] = &["PWM_PIN", "UART_TX_PIN", "UART_RX_READY", "UART_RX_BYTE"];

/// timer and shifter indices driving the model outputs
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Layout {
    pub pwm: Option<usize>,
    pub uart: Option<usize>,
    pub tx: Option<usize>,
    pub rx: Option<usize>,
}

/// flexio peripheral model
/// 
/// the first pwm timer and the first baud/bit timer are clocked, each on
/// its own schedule: a wake lands on the next tick at which the timer's
/// output changes. the shifters selecting the baud/bit timer (TIMSEL)
/// transmit and receive on its edges.
/// 
/// configuration writes take effect on the next `wake` or `initialize`.
/// a timer whose registers were not written keeps its pending edge.
#[derive(Clone, Debug)]
pub struct FlexIOModel {
    config: FlexIOConfig,
    clock_period: Time,
    timers: Vec<FlexIOTimer>,
    shifters: Vec<FlexIOShifter>,
    pin_inputs: u32,
    layout: Layout,
    // (time, ticks) of each timer's next event
    next_pwm: Option<(Time, u32)>,
    next_uart: Option<(Time, u32)>,
    reconfigured: bool,
    // timers decoded since the last wake
    retimed: u32,
}

impl FlexIOModel {

    pub fn new_with(config: FlexIOConfig, clock_freq: f64) -> Result<Self, peripheral::Error> {
        if !(clock_freq.is_finite() && clock_freq > 0.0) {
            return Err(peripheral::Error::configuration(
                format!("flexio clock frequency must be positive, got {clock_freq}")));
        }
        let clock_period = 1.0 / clock_freq;
        if clock_period < MIN_QUANT {
            return Err(peripheral::Error::configuration(
                format!("flexio clock period {clock_period} is below the time resolution")));
        }

        let timers = (0..TIMER_COUNT)
            .map(|n| FlexIOTimer::new_with(n, config.tim_ctl(n), config.tim_cfg(n), config.tim_cmp(n)))
            .collect();
        let shifters = (0..SHIFTER_COUNT)
            .map(|n| FlexIOShifter::new_with(n, config.shift_ctl(n), config.shift_cfg(n)))
            .collect();

        let mut model = Self {
            config,
            clock_period,
            timers,
            shifters,
            pin_inputs: 0,
            layout: Layout::default(),
            next_pwm: None,
            next_uart: None,
            reconfigured: false,
            retimed: 0,
        };
        model.select_layout();
        Ok(model)
    }

    pub fn config(&self) -> &FlexIOConfig {
        &self.config
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn timer(&self, n: usize) -> Option<&FlexIOTimer> {
        self.timers.get(n)
    }

    pub fn shifter(&self, n: usize) -> Option<&FlexIOShifter> {
        self.shifters.get(n)
    }

    pub fn is_enabled(&self) -> bool {
        self.config.ctrl().flexen()
    }

    /// consume the byte held by the receive shifter, if one is ready
    pub fn take_rx_byte(&mut self) -> Result<Option<u8>, peripheral::Error> {
        let byte = self.layout.rx
            .and_then(|rx| self.shifters[rx].take_buffer())
            .map(|word| (word & 0xFF) as u8);
        self.refresh()?;
        Ok(byte)
    }

    /// drive an external level onto a pin
    pub fn set_pin_input(&mut self, pin: usize, level: bool) -> Result<(), peripheral::Error> {
        if pin >= PIN_COUNT {
            return Err(peripheral::Error::configuration(format!("flexio has no pin {pin}")));
        }
        if level {
            self.pin_inputs |= 1u32 << pin;
        } else {
            self.pin_inputs &= !(1u32 << pin);
        }
        self.refresh()
    }

    /// level of a pin: a driving timer or transmitter wins over the
    /// external input
    pub fn pin_level(&self, pin: usize) -> bool {
        let timer = self.timers.iter()
            .find(|timer| timer.drives_pin() && timer.pin() == pin)
            .map(|timer| timer.pin_output());
        let shifter = self.shifters.iter()
            .find(|shifter| shifter.drives_pin() && shifter.pin() == pin)
            .map(|shifter| shifter.pin_output());
        timer.or(shifter).unwrap_or(self.pin_inputs & (1u32 << pin) != 0)
    }

    fn select_layout(&mut self) {
        let pwm = self.timers.iter().position(|timer| timer.mode() == TimerMode::Pwm);
        let uart = self.timers.iter().position(|timer| timer.mode() == TimerMode::BaudBit);
        let shifter_for = |mode: ShifterMode| {
            uart.and_then(|uart| self.shifters.iter()
                .position(|shifter| shifter.mode() == mode && shifter.timer_index() == uart))
        };
        let (tx, rx) = (shifter_for(ShifterMode::Transmit), shifter_for(ShifterMode::Receive));
        self.layout = Layout { pwm, uart, tx, rx };

        if let Some(uart) = uart {
            let bits = self.timers[uart].high_reload();
            for shifter in [tx, rx].into_iter().flatten() {
                self.shifters[shifter].set_word_bits(bits);
            }
        }
        log::debug!("flexio layout: {:?}", self.layout);
    }

    fn reset_units(&mut self) {
        for timer in self.timers.iter_mut() {
            timer.reset();
        }
        for shifter in self.shifters.iter_mut() {
            shifter.reset();
        }
        self.next_pwm = None;
        self.next_uart = None;
    }

    fn decode_timer(&mut self, n: usize) {
        self.timers[n].configure(self.config.tim_ctl(n), self.config.tim_cfg(n), self.config.tim_cmp(n));
        self.retimed |= 1u32 << n;
        self.reconfigured = true;
    }

    fn decode_shifter(&mut self, n: usize) {
        self.shifters[n].configure(self.config.shift_ctl(n), self.config.shift_cfg(n));
        self.reconfigured = true;
    }

    /// schedule any idle timer slot, returning the earliest pending slot
    fn arm(&mut self, now: Time) -> Option<Time> {
        if !self.is_enabled() {
            self.next_pwm = None;
            self.next_uart = None;
            return None;
        }
        let period = self.clock_period;
        let slot = |timer: Option<&FlexIOTimer>| -> Option<(Time, u32)> {
            timer.and_then(|timer| timer.ticks_to_event())
                .map(|ticks| (now + ticks as f64 * period, ticks))
        };
        if self.next_pwm.is_none() {
            self.next_pwm = slot(self.layout.pwm.map(|n| &self.timers[n]));
        }
        if self.next_uart.is_none() {
            self.next_uart = slot(self.layout.uart.map(|n| &self.timers[n]));
        }
        [self.next_pwm, self.next_uart].into_iter()
            .flatten()
            .map(|(time, _)| time)
            .reduce(f64::min)
    }

    fn clock_shifters(&mut self, edge: Edge) {
        if edge == Edge::None {
            return;
        }
        // sample before the transmitter moves the line
        if let Some(rx) = self.layout.rx {
            let input = match self.shifters[rx].input_source() {
                InputSource::Pin => self.pin_level(self.shifters[rx].pin()),
                InputSource::NextShifter => self.shifters.get(rx + 1)
                    .map_or(false, |next| next.output_level()),
            };
            self.shifters[rx].shift(edge, input);
        }
        if let Some(tx) = self.layout.tx {
            self.shifters[tx].shift(edge, false);
        }
    }

    fn refresh_triggers(&mut self) {
        for n in 0..self.timers.len() {
            let Some(source) = self.timers[n].trigger_shifter() else {
                continue;
            };
            let flag = self.shifters.get(source).map_or(false, |shifter| shifter.status());
            let level = flag ^ self.timers[n].trigger_polarity();
            self.timers[n].set_trigger(level);
        }
    }

    /// propagate triggers and mirror unit state into the status, pin and
    /// receive buffer registers
    fn refresh(&mut self) -> Result<(), peripheral::Error> {
        self.refresh_triggers();

        let shiftstat = flag_bits(self.shifters.iter().map(|shifter| shifter.status()));
        let shifterr = flag_bits(self.shifters.iter().map(|shifter| shifter.has_error()));
        let timstat = flag_bits(self.timers.iter().map(|timer| timer.status()));
        let pins = flag_bits((0..PIN_COUNT).map(|pin| self.pin_level(pin)));

        self.config.force(RegisterId::ShiftStat, shiftstat)?;
        self.config.force(RegisterId::ShiftErr, shifterr)?;
        self.config.force(RegisterId::TimStat, timstat)?;
        self.config.force(RegisterId::Pin, pins)?;
        for (n, shifter) in self.shifters.iter().enumerate() {
            if shifter.mode() == ShifterMode::Receive {
                self.config.force(RegisterId::ShiftBuf(n), shifter.buffer())?;
            }
        }
        Ok(())
    }

    // units selected by a write-one-to-clear value
    fn clear_bits(value: u32, count: usize) -> impl Iterator<Item = usize> {
        (0..count).filter(move |n| value & (1u32 << *n) != 0)
    }
}

fn flag_bits(flags: impl Iterator<Item = bool>) -> u32 {
    flags.enumerate().fold(0, |acc, (n, set)| acc | ((set as u32) << n))
}

impl PeripheralModel for FlexIOModel {

    fn name(&self) -> &str {
        "flexio"
    }

    fn initialize(&mut self, now: Time) -> Result<Option<Time>, peripheral::Error> {
        for n in 0..TIMER_COUNT {
            self.decode_timer(n);
        }
        for n in 0..SHIFTER_COUNT {
            self.decode_shifter(n);
        }
        self.reconfigured = false;
        self.retimed = 0;
        self.select_layout();
        self.reset_units();
        self.refresh()?;
        log::debug!("flexio initialized (enabled: {})", self.is_enabled());
        Ok(self.arm(now))
    }

    fn update(&mut self, now: Time) -> Result<Option<Time>, peripheral::Error> {
        if let Some((time, ticks)) = self.next_pwm.filter(|(time, _)| *time <= now) {
            self.next_pwm = None;
            if let Some(pwm) = self.layout.pwm {
                let edge = self.timers[pwm].advance(ticks);
                log::trace!("flexio pwm {:?} @ {}", edge, time);
            }
        }
        if let Some((time, ticks)) = self.next_uart.filter(|(time, _)| *time <= now) {
            self.next_uart = None;
            if let Some(uart) = self.layout.uart {
                let edge = self.timers[uart].advance(ticks);
                log::trace!("flexio uart {:?} @ {}", edge, time);
                self.clock_shifters(edge);
            }
        }
        self.refresh()?;
        Ok(self.arm(now))
    }

    fn wake(&mut self, now: Time) -> Option<Time> {
        if self.reconfigured {
            self.reconfigured = false;
            let previous = self.layout;
            self.select_layout();

            // a slot stays armed unless its timer was reset or replaced
            let retimed = std::mem::take(&mut self.retimed);
            let stale = |before: Option<usize>, after: Option<usize>| {
                before != after || after.map_or(false, |n| retimed & (1u32 << n) != 0)
            };
            if stale(previous.pwm, self.layout.pwm) {
                self.next_pwm = None;
            }
            if stale(previous.uart, self.layout.uart) {
                self.next_uart = None;
            }
        }
        self.arm(now)
    }

    fn output_names(&self) -> &'static [&'static str] {
        OUTPUT_NAMES
    }

    fn outputs(&self) -> Vec<Output> {
        let pwm = self.layout.pwm.map_or(false, |n| self.timers[n].pin_output());
        let tx = self.layout.tx.map_or(true, |n| self.shifters[n].pin_output());
        let rx = self.layout.rx.map(|n| &self.shifters[n]);
        let ready = rx.map_or(false, |rx| rx.status());
        let byte = rx.filter(|rx| rx.status()).map_or(0, |rx| rx.buffer() & 0xFF);
        vec![
            Output::new_with("PWM_PIN", Value::Bool(pwm)),
            Output::new_with("UART_TX_PIN", Value::Bool(tx)),
            Output::new_with("UART_RX_READY", Value::Bool(ready)),
            Output::new_with("UART_RX_BYTE", Value::Int(byte as u64)),
        ]
    }

    fn read_register(&self, address: u32) -> Result<u32, peripheral::Error> {
        Ok(self.config.read_by_address(address)?)
    }

    fn write_register(&mut self, address: u32, value: u32) -> Result<(), peripheral::Error> {
        let id = self.config.decode(address)?;
        match id {
            RegisterId::Verid | RegisterId::Param | RegisterId::Pin => {
                return Err(RegisterAccessError::ReadOnly(address).into());
            },
            RegisterId::ShiftStat => {
                for n in Self::clear_bits(value, SHIFTER_COUNT) {
                    let shifter = &mut self.shifters[n];
                    if shifter.take_buffer().is_none() {
                        shifter.clear_status();
                    }
                }
            },
            RegisterId::ShiftErr => {
                for n in Self::clear_bits(value, SHIFTER_COUNT) {
                    self.shifters[n].clear_faults();
                }
            },
            RegisterId::TimStat => {
                for n in Self::clear_bits(value, TIMER_COUNT) {
                    self.timers[n].clear_status();
                }
            },
            RegisterId::Ctrl => {
                let was_enabled = self.is_enabled();
                self.config.write(id, value)?;
                if Ctrl::from(value).swrst() {
                    log::debug!("flexio software reset");
                    self.reset_units();
                }
                if was_enabled != self.is_enabled() {
                    log::debug!("flexio {}", if self.is_enabled() { "enabled" } else { "disabled" });
                    self.reconfigured = true;
                }
            },
            RegisterId::ShiftBuf(n) => {
                self.config.write(id, value)?;
                self.shifters[n].write_buffer(value);
            },
            RegisterId::ShiftCtl(n) | RegisterId::ShiftCfg(n) => {
                self.config.write(id, value)?;
                self.decode_shifter(n);
            },
            RegisterId::TimCtl(n) | RegisterId::TimCfg(n) | RegisterId::TimCmp(n) => {
                self.config.write(id, value)?;
                self.decode_timer(n);
            },
        }
        self.refresh()
    }
}
