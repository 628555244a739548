//! register file
//! 
//! address-indexed register storage with read-only enforcement

use nohash_hasher::IntMap;

use crate::peripheral::RegisterAccessError;

/// a single hardware register
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Register {
    pub value: u32,
    pub width: u8,
    pub read_only: bool,
}

impl Register {
    /// mask of the bits implemented by this register
    pub fn mask(&self) -> u32 {
        if self.width >= 32 {
            u32::MAX
        } else {
            (1u32 << self.width) - 1
        }
    }
}

/// register file
/// 
/// owned by a peripheral model. values are masked to the register width
/// on every write. `force` is the hardware-side path for registers the
/// model maintains itself (read-only status, current counter values)
#[derive(Clone, Debug, Default)]
pub struct RegisterFile {
    registers: IntMap<u32, Register>,
}

impl RegisterFile {

    pub fn new() -> Self {
        Self::default()
    }

    /// define a register at the given address with a reset value
    /// 
    /// redefining an address replaces the previous register
    pub fn define(
        &mut self,
        address: u32,
        width: u8,
        reset: u32,
        read_only: bool,
    ) -> &mut Self {
        let mut register = Register { value: 0, width, read_only };
        register.value = reset & register.mask();
        self.registers.insert(address, register);
        self
    }

    /// get a reference to the register at the given address
    pub fn get(&self, address: u32) -> Option<&Register> {
        self.registers.get(&address)
    }

    pub fn contains(&self, address: u32) -> bool {
        self.registers.contains_key(&address)
    }

    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    /// defined register addresses in ascending order
    pub fn addresses(&self) -> Vec<u32> {
        let mut addresses: Vec<u32> = self.registers.keys().copied().collect();
        addresses.sort_unstable();
        addresses
    }

    /// read the register at the given address
    pub fn read(&self, address: u32) -> Result<u32, RegisterAccessError> {
        self.registers.get(&address)
            .map(|register| register.value)
            .ok_or(RegisterAccessError::Unknown(address))
    }

    /// write the register at the given address
    /// 
    /// fails without modifying anything if the register is read-only
    pub fn write(&mut self, address: u32, value: u32) -> Result<(), RegisterAccessError> {
        let register = self.registers.get_mut(&address)
            .ok_or(RegisterAccessError::Unknown(address))?;
        if register.read_only {
            return Err(RegisterAccessError::ReadOnly(address));
        }
        register.value = value & register.mask();
        Ok(())
    }

    /// write the register at the given address, ignoring read-only protection
    pub fn force(&mut self, address: u32, value: u32) -> Result<(), RegisterAccessError> {
        let register = self.registers.get_mut(&address)
            .ok_or(RegisterAccessError::Unknown(address))?;
        register.value = value & register.mask();
        Ok(())
    }
}
