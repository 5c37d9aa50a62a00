//! Data stack discipline for PUSH and POP.
//!
//! The stack lives in memory and is addressed through R7. PUSH writes at SP
//! and then moves SP down; POP moves SP up and then reads. Both check their
//! bound before touching anything.

use crate::error::CpuError;
use crate::memory::Memory;
use crate::registers::RegisterFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackBounds {
    /// SP at reset; POP may not move SP above it.
    pub top: u8,
    /// Lowest value SP may reach after a PUSH.
    pub floor: u8,
}

pub fn push(
    bounds: StackBounds,
    memory: &mut Memory,
    regs: &mut RegisterFile,
    value: u8,
) -> Result<(), CpuError> {
    let sp = regs.sp();
    if sp <= bounds.floor {
        return Err(CpuError::StackOverflow);
    }
    memory.write(sp as usize, value)?;
    regs.set_sp(sp - 1);
    Ok(())
}

pub fn pop(
    bounds: StackBounds,
    memory: &Memory,
    regs: &mut RegisterFile,
) -> Result<u8, CpuError> {
    let sp = regs.sp();
    if sp >= bounds.top {
        return Err(CpuError::StackUnderflow);
    }
    let value = memory.read(sp as usize + 1)?;
    regs.set_sp(sp + 1);
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDS: StackBounds = StackBounds {
        top: 0xF4,
        floor: 0xF0,
    };

    fn setup() -> (Memory, RegisterFile) {
        let mut regs = RegisterFile::new();
        regs.set_sp(BOUNDS.top);
        (Memory::new(), regs)
    }

    #[test]
    fn test_push_writes_then_decrements() {
        let (mut memory, mut regs) = setup();
        push(BOUNDS, &mut memory, &mut regs, 0x42).unwrap();
        assert_eq!(memory.read(0xF4), Ok(0x42));
        assert_eq!(regs.sp(), 0xF3);

        assert_eq!(pop(BOUNDS, &memory, &mut regs), Ok(0x42));
        assert_eq!(regs.sp(), 0xF4);
    }

    #[test]
    fn test_pop_on_empty_stack_underflows() {
        let (memory, mut regs) = setup();
        assert_eq!(pop(BOUNDS, &memory, &mut regs), Err(CpuError::StackUnderflow));
        assert_eq!(regs.sp(), BOUNDS.top);
    }

    #[test]
    fn test_push_past_floor_overflows_without_writing() {
        let (mut memory, mut regs) = setup();
        for value in 1..=4 {
            push(BOUNDS, &mut memory, &mut regs, value).unwrap();
        }
        assert_eq!(regs.sp(), BOUNDS.floor);
        assert_eq!(
            push(BOUNDS, &mut memory, &mut regs, 0xEE),
            Err(CpuError::StackOverflow)
        );
        assert_eq!(regs.sp(), BOUNDS.floor);
        assert_eq!(memory.read(BOUNDS.floor as usize), Ok(0));
    }
}
