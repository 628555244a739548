//! flexio timer
//! 
//! decodes TIMCTL, TIMCFG and TIMCMP and steps the timer counter one
//! flexio clock tick at a time
use log;

use crate::peripheral;
use super::{ TimCfg, TimCtl };

/// timer operating mode (TIMOD)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerMode {
    Disabled,
    /// dual 8-bit counters baud/bit mode
    BaudBit,
    /// dual 8-bit counters pwm high mode
    Pwm,
}

impl TimerMode {
    pub fn decode(timod: u8) -> Result<Self, peripheral::Error> {
        match timod {
            0b00 => Ok(Self::Disabled),
            0b01 => Ok(Self::BaudBit),
            0b10 => Ok(Self::Pwm),
            encoding => Err(peripheral::Error::UnsupportedMode {
                unit: "timer",
                encoding: encoding as u32,
            }),
        }
    }
}

/// transition of a timer output
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Edge {
    None,
    Posedge,
    Negedge,
}

impl Edge {
    pub fn between(before: bool, after: bool) -> Self {
        match (before, after) {
            (false, true) => Self::Posedge,
            (true, false) => Self::Negedge,
            _ => Self::None,
        }
    }
}

/// flexio timer
/// 
/// in pwm mode the low byte of the compare value sets the low period and
/// the high byte the high period. in baud/bit mode the low byte sets the
/// half-bit period, so each bit produces a falling and a rising output
/// edge, and the high byte sets the number of bits per word.
#[derive(Clone, Debug)]
pub struct FlexIOTimer {
    index: usize,
    ctl: TimCtl,
    cfg: TimCfg,
    cmp: u32,
    mode: TimerMode,
    decode_error: Option<peripheral::Error>,
    low_reload: u32,
    high_reload: u32,
    low_count: u32,
    high_count: u32,
    output: bool,
    enabled: bool,
    trigger: bool,
    stop_pending: bool,
    stop_delay: u32,
    status: bool,
}

impl FlexIOTimer {

    pub fn new_with(index: usize, ctl: TimCtl, cfg: TimCfg, cmp: u32) -> Self {
        let mut timer = Self {
            index,
            ctl,
            cfg,
            cmp,
            mode: TimerMode::Disabled,
            decode_error: None,
            low_reload: 1,
            high_reload: 1,
            low_count: 1,
            high_count: 1,
            output: false,
            enabled: false,
            trigger: false,
            stop_pending: false,
            stop_delay: 0,
            status: false,
        };
        timer.configure(ctl, cfg, cmp);
        timer
    }

    /// decode new register values and reset the timer
    pub fn configure(&mut self, ctl: TimCtl, cfg: TimCfg, cmp: u32) {
        self.ctl = ctl;
        self.cfg = cfg;
        self.cmp = cmp & 0xFFFF;
        self.decode_error = None;

        self.mode = match TimerMode::decode(ctl.timod()) {
            Ok(mode) => mode,
            Err(err) => {
                log::warn!("flexio timer {}: {}, timer is inert", self.index, err);
                self.decode_error = Some(err);
                TimerMode::Disabled
            },
        };
        if self.mode != TimerMode::Disabled && cfg.timdec() != 0 {
            let err = peripheral::Error::UnsupportedMode {
                unit: "timer decrement",
                encoding: cfg.timdec() as u32,
            };
            log::warn!("flexio timer {}: {}, only the flexio clock is modeled, timer is inert", self.index, err);
            self.decode_error = Some(err);
            self.mode = TimerMode::Disabled;
        }

        let low = (self.cmp & 0xFF) + 1;
        let high = ((self.cmp >> 8) & 0xFF) + 1;
        (self.low_reload, self.high_reload) = match self.mode {
            TimerMode::BaudBit => (low * 2, high),
            _ => (low, high),
        };
        self.reset();
    }

    /// return the timer to its configured initial state
    pub fn reset(&mut self) {
        self.low_count = self.low_reload;
        self.high_count = self.high_reload;
        self.output = self.initial_output();
        self.stop_pending = false;
        self.stop_delay = 0;
        self.status = false;
        self.enabled = self.mode != TimerMode::Disabled
            && (self.cfg.timena() == 0 || self.trigger);
    }

    // TIMOUT 0 and 2 start high, 1 and 3 start low
    fn initial_output(&self) -> bool {
        self.cfg.timout() & 1 == 0
    }

    fn stop_on_compare(&self) -> bool {
        matches!(self.cfg.tstop(), 1 | 3)
    }

    fn disable_on_compare(&self) -> bool {
        matches!(self.cfg.timdis(), 2 | 3)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    /// the unsupported-mode error of the last decode, if the timer is inert
    pub fn decode_error(&self) -> Option<&peripheral::Error> {
        self.decode_error.as_ref()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn low_reload(&self) -> u32 {
        self.low_reload
    }

    pub fn high_reload(&self) -> u32 {
        self.high_reload
    }

    /// raw timer output
    pub fn output(&self) -> bool {
        self.output
    }

    /// timer output as seen on its pin
    pub fn pin_output(&self) -> bool {
        self.output ^ self.ctl.pinpol()
    }

    pub fn drives_pin(&self) -> bool {
        self.ctl.pincfg() == 3
    }

    pub fn pin(&self) -> usize {
        self.ctl.pinsel() as usize
    }

    pub fn status(&self) -> bool {
        self.status
    }

    pub fn clear_status(&mut self) {
        self.status = false;
    }

    pub fn is_stop_pending(&self) -> bool {
        self.stop_pending
    }

    /// shifter whose status flag is selected as internal trigger, if any
    pub fn trigger_shifter(&self) -> Option<usize> {
        let trgsel = self.ctl.trgsel();
        (self.ctl.trgsrc() && trgsel % 4 == 1).then_some((trgsel / 4) as usize)
    }

    pub fn trigger_polarity(&self) -> bool {
        self.ctl.trgpol()
    }

    /// update the trigger input, enabling a trigger-enabled timer on a
    /// high level
    pub fn set_trigger(&mut self, level: bool) {
        self.trigger = level;
        if level && !self.enabled && self.mode != TimerMode::Disabled && self.cfg.timena() != 0 {
            log::debug!("flexio timer {} enabled by trigger", self.index);
            self.low_count = self.low_reload;
            self.high_count = self.high_reload;
            self.output = self.initial_output();
            self.enabled = true;
        }
    }

    /// number of ticks until the next output edge or state change
    pub fn ticks_to_event(&self) -> Option<u32> {
        if !self.enabled {
            return None;
        }
        let ticks = match self.mode {
            TimerMode::Disabled => return None,
            TimerMode::Pwm if self.output => self.high_count,
            TimerMode::Pwm => self.low_count,
            TimerMode::BaudBit if self.stop_pending => self.stop_delay,
            TimerMode::BaudBit => {
                let half = self.low_reload / 2;
                if self.low_count > half {
                    self.low_count - half
                } else {
                    self.low_count
                }
            },
        };
        Some(ticks)
    }

    /// advance by `ticks` clock ticks, returning the edge of the last one
    pub fn advance(&mut self, ticks: u32) -> Edge {
        let mut edge = Edge::None;
        for _ in 0..ticks {
            edge = self.tick();
        }
        edge
    }

    /// advance by one flexio clock tick
    pub fn tick(&mut self) -> Edge {
        if !self.enabled {
            return Edge::None;
        }
        let before = self.output;
        match self.mode {
            TimerMode::Disabled => (),
            TimerMode::Pwm => self.tick_pwm(),
            TimerMode::BaudBit => self.tick_baud(),
        }
        Edge::between(before, self.output)
    }

    fn tick_pwm(&mut self) {
        if self.output {
            self.high_count -= 1;
            if self.high_count == 0 {
                self.high_count = self.high_reload;
                self.output = false;
            }
        } else {
            self.low_count -= 1;
            if self.low_count == 0 {
                self.low_count = self.low_reload;
                self.output = true;
            }
        }
    }

    fn tick_baud(&mut self) {
        if self.stop_pending {
            self.stop_delay -= 1;
            if self.stop_delay == 0 {
                self.stop_pending = false;
                self.end_word();
            }
            return;
        }

        self.low_count -= 1;
        if self.low_count == self.low_reload / 2 {
            self.output = !self.output;
        } else if self.low_count == 0 {
            self.output = !self.output;
            self.low_count = self.low_reload;
            self.high_count -= 1;
            if self.high_count == 0 {
                self.status = true;
                if self.stop_on_compare() {
                    self.stop_pending = true;
                    self.stop_delay = self.low_reload;
                } else {
                    self.end_word();
                }
            }
        }
    }

    fn end_word(&mut self) {
        self.high_count = self.high_reload;
        if self.disable_on_compare() {
            log::trace!("flexio timer {} disabled on compare", self.index);
            self.enabled = false;
        }
    }
}
