use serde::{Deserialize, Serialize};

use crate::error::{Address, CpuError};

pub const REGISTER_COUNT: usize = 8;

/// R7 is the data stack pointer. R5 and R6 are conventionally the interrupt
/// mask and status; the engine treats them as ordinary registers.
pub const SP: u8 = 7;

/// The eight general-purpose registers R0-R7.
///
/// The file itself has no opinion about R7; the stack discipline lives in
/// [`crate::stack`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterFile {
    regs: [u8; REGISTER_COUNT],
}

impl RegisterFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: u8) -> Result<u8, CpuError> {
        self.regs
            .get(index as usize)
            .copied()
            .ok_or(CpuError::AddressOutOfRange(Address::Register(index)))
    }

    pub fn set(&mut self, index: u8, value: u8) -> Result<(), CpuError> {
        let slot = self
            .regs
            .get_mut(index as usize)
            .ok_or(CpuError::AddressOutOfRange(Address::Register(index)))?;
        *slot = value;
        Ok(())
    }

    pub fn sp(&self) -> u8 {
        self.regs[SP as usize]
    }

    pub fn set_sp(&mut self, value: u8) {
        self.regs[SP as usize] = value;
    }

    pub fn as_array(&self) -> [u8; REGISTER_COUNT] {
        self.regs
    }
}
