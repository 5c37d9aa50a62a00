use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// A location the engine tried to reach outside of its valid bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Address {
    Memory(usize),
    Register(u8),
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Memory(addr) => write!(f, "memory ${:02X}", addr),
            Address::Register(index) => write!(f, "register R{}", index),
        }
    }
}

/// Everything that can go wrong while executing a single instruction.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum CpuError {
    #[error("address out of range: {0}")]
    AddressOutOfRange(Address),
    #[error("unknown opcode ${0:02X}")]
    UnknownOpcode(u8),
    #[error("unsupported ALU operation in opcode ${0:02X}")]
    UnsupportedAluOperation(u8),
    #[error("division by zero")]
    DivideByZero,
    #[error("stack overflow")]
    StackOverflow,
    #[error("stack underflow")]
    StackUnderflow,
    #[error("return with empty call stack")]
    CallStackUnderflow,
}

impl CpuError {
    /// Short stable name, used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            CpuError::AddressOutOfRange(_) => "address_out_of_range",
            CpuError::UnknownOpcode(_) => "unknown_opcode",
            CpuError::UnsupportedAluOperation(_) => "unsupported_alu_operation",
            CpuError::DivideByZero => "divide_by_zero",
            CpuError::StackOverflow => "stack_overflow",
            CpuError::StackUnderflow => "stack_underflow",
            CpuError::CallStackUnderflow => "call_stack_underflow",
        }
    }
}

/// A fatal error together with where it happened.
///
/// `opcode` is `None` when the fetch itself fell outside of memory.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{} at PC ${:02X}{}", .error, .pc, opcode_suffix(.opcode))]
pub struct Fault {
    pub pc: usize,
    pub opcode: Option<u8>,
    #[source]
    pub error: CpuError,
}

fn opcode_suffix(opcode: &Option<u8>) -> String {
    match opcode {
        Some(opcode) => format!(" (opcode ${:02X})", opcode),
        None => String::new(),
    }
}

/// Errors raised while turning a program listing into bytes.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: invalid binary literal {token:?}")]
    InvalidLiteral { line: usize, token: String },
    #[error("program is {len} bytes, memory holds 256")]
    ProgramTooLarge { len: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("stack floor ${floor:02X} is above stack top ${top:02X}")]
    FloorAboveTop { floor: u8, top: u8 },
    #[error("call stack limit must be at least 1")]
    ZeroCallStackLimit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_display_includes_pc_and_opcode() {
        let fault = Fault {
            pc: 0x0A,
            opcode: Some(0xA4),
            error: CpuError::DivideByZero,
        };
        assert_eq!(fault.to_string(), "division by zero at PC $0A (opcode $A4)");

        let fault = Fault {
            pc: 0x100,
            opcode: None,
            error: CpuError::AddressOutOfRange(Address::Memory(0x100)),
        };
        assert_eq!(
            fault.to_string(),
            "address out of range: memory $100 at PC $100"
        );
    }

    #[test]
    fn test_fault_source_is_the_cpu_error() {
        use std::error::Error as _;

        let fault = Fault {
            pc: 0,
            opcode: Some(0x11),
            error: CpuError::CallStackUnderflow,
        };
        let source = fault.source().map(|err| err.to_string());
        assert_eq!(source.as_deref(), Some("return with empty call stack"));
    }
}
