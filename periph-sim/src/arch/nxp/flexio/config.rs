//! flexio register configuration
//! 
//! raw register storage with typed bit-field views
use bitfield_struct::bitfield;

use crate::peripheral::{ RegisterAccessError, RegisterFile };
use super::{ SHIFTER_COUNT, TIMER_COUNT };

/// version id reset value (feature set 1, version 1.1)
pub const VERID_RESET: u32 = 0x0101_0001;
/// parameter reset value (32 triggers, 32 pins, 4 timers, 4 shifters)
pub const PARAM_RESET: u32 = 0x2020_0404;

/// FLEXIO_CTRL
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct Ctrl {
    pub flexen: bool,
    pub swrst: bool,
    pub fastacc: bool,
    #[bits(27)]
    __: u32,
    pub dbge: bool,
    pub dozen: bool,
}

/// FLEXIO_SHIFTCTLn
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct ShiftCtl {
    #[bits(3)]
    pub smod: u8,
    #[bits(4)]
    __: u8,
    pub pinpol: bool,
    #[bits(5)]
    pub pinsel: u8,
    #[bits(3)]
    __: u8,
    #[bits(2)]
    pub pincfg: u8,
    #[bits(5)]
    __: u8,
    pub timpol: bool,
    #[bits(3)]
    pub timsel: u8,
    #[bits(5)]
    __: u8,
}

/// FLEXIO_SHIFTCFGn
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct ShiftCfg {
    #[bits(2)]
    pub sstart: u8,
    #[bits(2)]
    __: u8,
    #[bits(2)]
    pub sstop: u8,
    #[bits(2)]
    __: u8,
    pub insrc: bool,
    #[bits(23)]
    __: u32,
}

/// FLEXIO_TIMCTLn
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct TimCtl {
    #[bits(2)]
    pub timod: u8,
    #[bits(5)]
    __: u8,
    pub pinpol: bool,
    #[bits(5)]
    pub pinsel: u8,
    #[bits(3)]
    __: u8,
    #[bits(2)]
    pub pincfg: u8,
    #[bits(4)]
    __: u8,
    pub trgsrc: bool,
    pub trgpol: bool,
    #[bits(6)]
    pub trgsel: u8,
    #[bits(2)]
    __: u8,
}

/// FLEXIO_TIMCFGn
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct TimCfg {
    #[bits(1)]
    __: u8,
    pub tstart: bool,
    #[bits(2)]
    __: u8,
    #[bits(2)]
    pub tstop: u8,
    #[bits(2)]
    __: u8,
    #[bits(3)]
    pub timena: u8,
    #[bits(1)]
    __: u8,
    #[bits(3)]
    pub timdis: u8,
    #[bits(1)]
    __: u8,
    #[bits(3)]
    pub timrst: u8,
    #[bits(1)]
    __: u8,
    #[bits(2)]
    pub timdec: u8,
    #[bits(2)]
    __: u8,
    #[bits(2)]
    pub timout: u8,
    #[bits(6)]
    __: u8,
}

/// flexio register identifiers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RegisterId {
    Verid,
    Param,
    Ctrl,
    Pin,
    ShiftStat,
    ShiftErr,
    TimStat,
    ShiftCtl(usize),
    ShiftCfg(usize),
    ShiftBuf(usize),
    TimCtl(usize),
    TimCfg(usize),
    TimCmp(usize),
}

impl RegisterId {
    /// offset of the register from the block base
    pub fn offset(self) -> u32 {
        let array = |base: u32, n: usize| base + 4 * n as u32;
        match self {
            Self::Verid => 0x000,
            Self::Param => 0x004,
            Self::Ctrl => 0x008,
            Self::Pin => 0x00C,
            Self::ShiftStat => 0x010,
            Self::ShiftErr => 0x014,
            Self::TimStat => 0x018,
            Self::ShiftCtl(n) => array(0x080, n),
            Self::ShiftCfg(n) => array(0x100, n),
            Self::ShiftBuf(n) => array(0x200, n),
            Self::TimCtl(n) => array(0x400, n),
            Self::TimCfg(n) => array(0x480, n),
            Self::TimCmp(n) => array(0x500, n),
        }
    }

    pub fn from_offset(offset: u32) -> Option<Self> {
        let id = match offset {
            0x000 => Self::Verid,
            0x004 => Self::Param,
            0x008 => Self::Ctrl,
            0x00C => Self::Pin,
            0x010 => Self::ShiftStat,
            0x014 => Self::ShiftErr,
            0x018 => Self::TimStat,
            _ => {
                if offset % 4 != 0 {
                    return None;
                }
                let (bank, count) = (offset & !0x7F, offset & 0x7F);
                let n = (count / 4) as usize;
                match bank {
                    0x080 if n < SHIFTER_COUNT => Self::ShiftCtl(n),
                    0x100 if n < SHIFTER_COUNT => Self::ShiftCfg(n),
                    0x200 if n < SHIFTER_COUNT => Self::ShiftBuf(n),
                    0x400 if n < TIMER_COUNT => Self::TimCtl(n),
                    0x480 if n < TIMER_COUNT => Self::TimCfg(n),
                    0x500 if n < TIMER_COUNT => Self::TimCmp(n),
                    _ => return None,
                }
            },
        };
        Some(id)
    }

    /// every register of the block
    pub fn all() -> Vec<Self> {
        let mut ids = vec![
            Self::Verid, Self::Param, Self::Ctrl, Self::Pin,
            Self::ShiftStat, Self::ShiftErr, Self::TimStat,
        ];
        for n in 0..SHIFTER_COUNT {
            ids.extend([Self::ShiftCtl(n), Self::ShiftCfg(n), Self::ShiftBuf(n)]);
        }
        for n in 0..TIMER_COUNT {
            ids.extend([Self::TimCtl(n), Self::TimCfg(n), Self::TimCmp(n)]);
        }
        ids
    }

    fn layout(self) -> (u8, u32, bool) {
        match self {
            Self::Verid => (32, VERID_RESET, true),
            Self::Param => (32, PARAM_RESET, true),
            Self::Pin => (32, 0, true),
            Self::ShiftStat | Self::ShiftErr => (SHIFTER_COUNT as u8, 0, false),
            Self::TimStat => (TIMER_COUNT as u8, 0, false),
            Self::TimCmp(_) => (16, 0, false),
            _ => (32, 0, false),
        }
    }
}

/// flexio configuration
/// 
/// holds the raw registers of one flexio instance mapped at `base`.
/// status registers are plain storage here; write-one-to-clear and the
/// hardware-maintained PIN value are applied by `FlexIOModel`.
#[derive(Clone, Debug)]
pub struct FlexIOConfig {
    base: u32,
    regs: RegisterFile,
}

impl FlexIOConfig {

    pub fn new_with(base: u32) -> Self {
        let mut regs = RegisterFile::new();
        for id in RegisterId::all() {
            let (width, reset, read_only) = id.layout();
            regs.define(base + id.offset(), width, reset, read_only);
        }
        Self { base, regs }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    /// absolute address of a register
    pub fn address(&self, id: RegisterId) -> u32 {
        self.base + id.offset()
    }

    /// identify the register at an absolute address
    pub fn decode(&self, address: u32) -> Result<RegisterId, RegisterAccessError> {
        address.checked_sub(self.base)
            .and_then(RegisterId::from_offset)
            .ok_or(RegisterAccessError::Unknown(address))
    }

    pub fn read_by_address(&self, address: u32) -> Result<u32, RegisterAccessError> {
        self.regs.read(address)
    }

    pub fn write_by_address(&mut self, address: u32, value: u32) -> Result<(), RegisterAccessError> {
        self.regs.write(address, value)
    }

    /// read a register, zero if the identifier is out of range
    pub fn read(&self, id: RegisterId) -> u32 {
        self.regs.get(self.address(id)).map_or(0, |reg| reg.value)
    }

    pub fn write(&mut self, id: RegisterId, value: u32) -> Result<(), RegisterAccessError> {
        self.regs.write(self.address(id), value)
    }

    /// update a register regardless of read-only protection
    pub fn force(&mut self, id: RegisterId, value: u32) -> Result<(), RegisterAccessError> {
        self.regs.force(self.address(id), value)
    }

    pub fn ctrl(&self) -> Ctrl {
        Ctrl::from(self.read(RegisterId::Ctrl))
    }

    pub fn shift_ctl(&self, n: usize) -> ShiftCtl {
        ShiftCtl::from(self.read(RegisterId::ShiftCtl(n)))
    }

    pub fn shift_cfg(&self, n: usize) -> ShiftCfg {
        ShiftCfg::from(self.read(RegisterId::ShiftCfg(n)))
    }

    pub fn shift_buf(&self, n: usize) -> u32 {
        self.read(RegisterId::ShiftBuf(n))
    }

    pub fn tim_ctl(&self, n: usize) -> TimCtl {
        TimCtl::from(self.read(RegisterId::TimCtl(n)))
    }

    pub fn tim_cfg(&self, n: usize) -> TimCfg {
        TimCfg::from(self.read(RegisterId::TimCfg(n)))
    }

    pub fn tim_cmp(&self, n: usize) -> u32 {
        self.read(RegisterId::TimCmp(n))
    }

    pub fn set_ctrl(&mut self, ctrl: Ctrl) -> Result<&mut Self, RegisterAccessError> {
        self.write(RegisterId::Ctrl, ctrl.into())?;
        Ok(self)
    }

    pub fn set_shift_ctl(&mut self, n: usize, ctl: ShiftCtl) -> Result<&mut Self, RegisterAccessError> {
        self.write(RegisterId::ShiftCtl(n), ctl.into())?;
        Ok(self)
    }

    pub fn set_shift_cfg(&mut self, n: usize, cfg: ShiftCfg) -> Result<&mut Self, RegisterAccessError> {
        self.write(RegisterId::ShiftCfg(n), cfg.into())?;
        Ok(self)
    }

    pub fn set_tim_ctl(&mut self, n: usize, ctl: TimCtl) -> Result<&mut Self, RegisterAccessError> {
        self.write(RegisterId::TimCtl(n), ctl.into())?;
        Ok(self)
    }

    pub fn set_tim_cfg(&mut self, n: usize, cfg: TimCfg) -> Result<&mut Self, RegisterAccessError> {
        self.write(RegisterId::TimCfg(n), cfg.into())?;
        Ok(self)
    }

    pub fn set_tim_cmp(&mut self, n: usize, cmp: u32) -> Result<&mut Self, RegisterAccessError> {
        self.write(RegisterId::TimCmp(n), cmp)?;
        Ok(self)
    }
}
