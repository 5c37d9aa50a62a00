use serde::{Deserialize, Serialize};

use crate::error::Fault;
use crate::flags::Flags;
use crate::registers::REGISTER_COUNT;

/// Read-only view of a machine, taken between instructions.
///
/// Produced by [`crate::cpu::CPU::snapshot`]; formatting is left to
/// whoever consumes it (see [`crate::trace`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MachineSnapshot {
    pub pc: usize,
    /// Byte at PC, `None` once PC has run past the end of memory.
    pub opcode: Option<u8>,
    /// The two cells after PC.
    pub operands: [Option<u8>; 2],
    pub registers: [u8; REGISTER_COUNT],
    pub flags: Flags,
    pub status: RunStatus,
    pub fault: Option<Fault>,
    pub call_depth: usize,
    pub steps: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Halted,
    Faulted,
}
