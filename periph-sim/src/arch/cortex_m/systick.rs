//! cortex-m systick timer
//! 
//! a 24-bit down-counter in the system control space
//! 
//! see armv7-m manual section B3.3
use bitfield_struct::bitfield;
use bitflags::bitflags;
use log;

use crate::peripheral;
use crate::peripheral::{ PeripheralModel, RegisterFile };
use crate::sim::{ Output, Time, Value };
use super::SCS_BASE;

/// control and status register
pub const CSR: u32 = SCS_BASE + 0x10;
/// reload value register
pub const RVR: u32 = SCS_BASE + 0x14;
/// current value register
pub const CVR: u32 = SCS_BASE + 0x18;
/// calibration value register
pub const CALIB: u32 = SCS_BASE + 0x1C;

bitflags! {
    /// SYST_CSR fields
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Csr: u32 {
        const ENABLE = 1 << 0;
        const TICKINT = 1 << 1;
        const CLKSOURCE = 1 << 2;
        const COUNTFLAG = 1 << 16;
    }
}

/// SYST_CALIB fields
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct Calib {
    #[bits(24)]
    pub tenms: u32,
    #[bits(6)]
    __: u8,
    pub skew: bool,
    pub noref: bool,
}

static OUTPUT_NAMES: &[&str] = &["CURRENT_VALUE", "COUNT_FLAG", "INTERRUPT_PENDING"];

/// systick timer model
/// 
/// counts down once per tick of the selected clock (the processor clock
/// when CLKSOURCE is set, the external reference otherwise). decrementing
/// past zero reloads from RVR, sets COUNTFLAG and, with TICKINT, pends
/// the systick exception.
#[derive(Clone, Debug)]
pub struct SysTickTimerModel {
    regs: RegisterFile,
    main_clk: f64,
    ext_clk: f64,
    tick_period: Option<Time>,
    interrupt: bool,
}

impl SysTickTimerModel {

    pub fn new_with(
        csr: u32,
        rvr: u32,
        cvr: u32,
        calib: u32,
        main_clk: f64,
        ext_clk: f64,
    ) -> Result<Self, peripheral::Error> {
        for (name, freq) in [("processor", main_clk), ("external", ext_clk)] {
            if !freq.is_finite() || freq < 0.0 {
                return Err(peripheral::Error::configuration(
                    format!("systick {name} clock must be a non-negative frequency, got {freq}")));
            }
        }

        let mut regs = RegisterFile::new();
        regs.define(CSR, 32, csr & Csr::all().bits(), false)
            .define(RVR, 24, rvr, false)
            .define(CVR, 24, cvr, false)
            .define(CALIB, 32, calib, true);

        let mut systick = Self { regs, main_clk, ext_clk, tick_period: None, interrupt: false };
        systick.tick_period = systick.compute_period();
        Ok(systick)
    }

    fn reg(&self, address: u32) -> u32 {
        self.regs.get(address).map_or(0, |reg| reg.value)
    }

    fn compute_period(&self) -> Option<Time> {
        let (source, freq) = if self.csr().contains(Csr::CLKSOURCE) {
            ("processor", self.main_clk)
        } else {
            ("external", self.ext_clk)
        };
        if freq > 0.0 {
            Some(1.0 / freq)
        } else {
            log::warn!("systick {source} clock is 0 Hz, counter will not advance on its own");
            None
        }
    }

    fn next_wake(&self, now: Time) -> Option<Time> {
        if self.is_enabled() {
            self.tick_period.map(|period| now + period)
        } else {
            None
        }
    }

    fn set_count_flag(&mut self, set: bool) -> Result<(), peripheral::Error> {
        let mut csr = self.csr();
        csr.set(Csr::COUNTFLAG, set);
        Ok(self.regs.force(CSR, csr.bits())?)
    }

    pub fn csr(&self) -> Csr {
        Csr::from_bits_truncate(self.reg(CSR))
    }

    pub fn calib(&self) -> Calib {
        Calib::from(self.reg(CALIB))
    }

    pub fn is_enabled(&self) -> bool {
        self.csr().contains(Csr::ENABLE)
    }

    pub fn reload_value(&self) -> u32 {
        self.reg(RVR)
    }

    pub fn tick_period(&self) -> Option<Time> {
        self.tick_period
    }

    /// current counter value. does not affect COUNTFLAG
    pub fn read_cvr(&self) -> u32 {
        self.reg(CVR)
    }

    /// read COUNTFLAG, clearing it
    pub fn read_count_flag(&mut self) -> bool {
        let set = self.csr().contains(Csr::COUNTFLAG);
        if set {
            // CSR is always defined
            self.set_count_flag(false).ok();
        }
        set
    }

    /// check for a pending systick exception, acknowledging it
    pub fn is_interrupt_generated(&mut self) -> bool {
        std::mem::take(&mut self.interrupt)
    }

    pub fn set_csr(&mut self, value: u32) -> Result<(), peripheral::Error> {
        self.write_register(CSR, value)
    }

    pub fn set_rvr(&mut self, value: u32) -> Result<(), peripheral::Error> {
        self.write_register(RVR, value)
    }

    /// clear the current value (any written value clears it)
    pub fn clear_cvr(&mut self) -> Result<(), peripheral::Error> {
        self.write_register(CVR, 0)
    }
}

impl PeripheralModel for SysTickTimerModel {

    fn name(&self) -> &str {
        "systick"
    }

    fn initialize(&mut self, now: Time) -> Result<Option<Time>, peripheral::Error> {
        self.interrupt = false;
        self.tick_period = self.compute_period();
        if self.is_enabled() {
            self.regs.force(CVR, self.reload_value())?;
        }
        log::debug!("systick initialized: csr {:?}, reload {}", self.csr(), self.reload_value());
        Ok(self.next_wake(now))
    }

    fn update(&mut self, now: Time) -> Result<Option<Time>, peripheral::Error> {
        if !self.is_enabled() {
            return Ok(None);
        }
        match self.read_cvr().checked_sub(1) {
            Some(value) => {
                self.regs.force(CVR, value)?;
                self.set_count_flag(false)?;
            },
            None => {
                self.regs.force(CVR, self.reload_value())?;
                self.set_count_flag(true)?;
                if self.csr().contains(Csr::TICKINT) {
                    self.interrupt = true;
                    log::trace!("systick exception pended @ {now}");
                }
            },
        }
        Ok(self.next_wake(now))
    }

    fn wake(&mut self, now: Time) -> Option<Time> {
        self.next_wake(now)
    }

    fn output_names(&self) -> &'static [&'static str] {
        OUTPUT_NAMES
    }

    fn outputs(&self) -> Vec<Output> {
        vec![
            Output::new_with("CURRENT_VALUE", Value::Int(self.read_cvr() as u64)),
            Output::new_with("COUNT_FLAG", Value::Bool(self.csr().contains(Csr::COUNTFLAG))),
            Output::new_with("INTERRUPT_PENDING", Value::Bool(self.interrupt)),
        ]
    }

    fn read_register(&self, address: u32) -> Result<u32, peripheral::Error> {
        Ok(self.regs.read(address)?)
    }

    fn write_register(&mut self, address: u32, value: u32) -> Result<(), peripheral::Error> {
        match address {
            CSR => {
                let old = self.csr();
                // COUNTFLAG is read-only from software
                let mut csr = Csr::from_bits_truncate(value) - Csr::COUNTFLAG;
                csr.set(Csr::COUNTFLAG, old.contains(Csr::COUNTFLAG));
                self.regs.write(CSR, csr.bits())?;
                self.tick_period = self.compute_period();

                let enabling = !old.contains(Csr::ENABLE) && csr.contains(Csr::ENABLE);
                if enabling && self.read_cvr() == 0 {
                    self.regs.force(CVR, self.reload_value())?;
                }
                Ok(())
            },
            CVR => {
                self.regs.write(CVR, 0)?;
                self.set_count_flag(false)
            },
            _ => Ok(self.regs.write(address, value)?),
        }
    }
}
