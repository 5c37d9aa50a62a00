//! Arithmetic/logic unit.
//!
//! Pure byte-in, byte-out functions. Nothing here sees the program counter
//! or memory; all results wrap modulo 256.

use crate::error::CpuError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Inc,
    Dec,
    And,
    Not,
    Or,
    Xor,
    Shl,
    Shr,
}

impl AluOp {
    /// Map the low nibble of an ALU-class opcode to its function.
    ///
    /// Identifier 7 is CMP, which the decoder handles on its own, so it is
    /// not a function here.
    pub fn from_id(id: u8) -> Option<AluOp> {
        match id {
            0x0 => Some(AluOp::Add),
            0x1 => Some(AluOp::Sub),
            0x2 => Some(AluOp::Mul),
            0x3 => Some(AluOp::Div),
            0x4 => Some(AluOp::Mod),
            0x5 => Some(AluOp::Inc),
            0x6 => Some(AluOp::Dec),
            0x8 => Some(AluOp::And),
            0x9 => Some(AluOp::Not),
            0xA => Some(AluOp::Or),
            0xB => Some(AluOp::Xor),
            0xC => Some(AluOp::Shl),
            0xD => Some(AluOp::Shr),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        match self {
            AluOp::Add => 0x0,
            AluOp::Sub => 0x1,
            AluOp::Mul => 0x2,
            AluOp::Div => 0x3,
            AluOp::Mod => 0x4,
            AluOp::Inc => 0x5,
            AluOp::Dec => 0x6,
            AluOp::And => 0x8,
            AluOp::Not => 0x9,
            AluOp::Or => 0xA,
            AluOp::Xor => 0xB,
            AluOp::Shl => 0xC,
            AluOp::Shr => 0xD,
        }
    }

    /// Unary functions take a single register operand and ignore `b`.
    pub fn is_unary(self) -> bool {
        matches!(self, AluOp::Inc | AluOp::Dec | AluOp::Not)
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            AluOp::Add => "ADD",
            AluOp::Sub => "SUB",
            AluOp::Mul => "MUL",
            AluOp::Div => "DIV",
            AluOp::Mod => "MOD",
            AluOp::Inc => "INC",
            AluOp::Dec => "DEC",
            AluOp::And => "AND",
            AluOp::Not => "NOT",
            AluOp::Or => "OR",
            AluOp::Xor => "XOR",
            AluOp::Shl => "SHL",
            AluOp::Shr => "SHR",
        }
    }
}

pub fn alu(op: AluOp, a: u8, b: u8) -> Result<u8, CpuError> {
    let result = match op {
        AluOp::Add => a.wrapping_add(b),
        AluOp::Sub => a.wrapping_sub(b),
        AluOp::Mul => a.wrapping_mul(b),
        AluOp::Div => a.checked_div(b).ok_or(CpuError::DivideByZero)?,
        AluOp::Mod => a.checked_rem(b).ok_or(CpuError::DivideByZero)?,
        AluOp::Inc => a.wrapping_add(1),
        AluOp::Dec => a.wrapping_sub(1),
        AluOp::And => a & b,
        AluOp::Not => !a,
        AluOp::Or => a | b,
        AluOp::Xor => a ^ b,
        AluOp::Shl => a << (b % 8),
        AluOp::Shr => a >> (b % 8),
    };
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_basic_operations() {
        assert_eq!(alu(AluOp::Add, 200, 100), Ok(44));
        assert_eq!(alu(AluOp::Sub, 3, 5), Ok(254));
        assert_eq!(alu(AluOp::Mul, 8, 9), Ok(72));
        assert_eq!(alu(AluOp::Div, 9, 2), Ok(4));
        assert_eq!(alu(AluOp::Mod, 9, 4), Ok(1));
        assert_eq!(alu(AluOp::And, 0b1100, 0b1010), Ok(0b1000));
        assert_eq!(alu(AluOp::Or, 0b1100, 0b1010), Ok(0b1110));
        assert_eq!(alu(AluOp::Xor, 0b1100, 0b1010), Ok(0b0110));
        assert_eq!(alu(AluOp::Inc, 255, 0), Ok(0));
        assert_eq!(alu(AluOp::Dec, 0, 0), Ok(255));
    }

    #[test]
    fn test_not_ignores_second_operand() {
        assert_eq!(alu(AluOp::Not, 0b1010_0101, 0), Ok(0b0101_1010));
        assert_eq!(alu(AluOp::Not, 0b1010_0101, 0xFF), Ok(0b0101_1010));
    }

    #[test]
    fn test_shifts_are_logical_and_take_count_mod_8() {
        assert_eq!(alu(AluOp::Shl, 0b1000_0001, 1), Ok(0b0000_0010));
        assert_eq!(alu(AluOp::Shr, 0b1000_0000, 7), Ok(0b0000_0001));
        // no sign extension
        assert_eq!(alu(AluOp::Shr, 0xF0, 4), Ok(0x0F));
        assert_eq!(alu(AluOp::Shl, 0x01, 9), Ok(0x02));
        assert_eq!(alu(AluOp::Shr, 0x80, 8), Ok(0x80));
    }

    #[test]
    fn test_zero_divisor() {
        assert_eq!(alu(AluOp::Mod, 7, 0), Err(CpuError::DivideByZero));
        assert_eq!(alu(AluOp::Div, 7, 0), Err(CpuError::DivideByZero));
    }

    #[test]
    fn test_id_mapping() {
        for id in 0..16u8 {
            if let Some(op) = AluOp::from_id(id) {
                assert_eq!(op.id(), id);
            }
        }
        assert_eq!(AluOp::from_id(0x7), None);
        assert_eq!(AluOp::from_id(0xE), None);
        assert_eq!(AluOp::from_id(0xF), None);
    }

    proptest! {
        #[test]
        fn add_and_mul_wrap_modulo_256(a in any::<u8>(), b in any::<u8>()) {
            prop_assert_eq!(alu(AluOp::Add, a, b).unwrap() as u32, (a as u32 + b as u32) % 256);
            prop_assert_eq!(alu(AluOp::Mul, a, b).unwrap() as u32, (a as u32 * b as u32) % 256);
        }

        #[test]
        fn mod_matches_remainder(a in any::<u8>(), b in 1u8..=255) {
            prop_assert_eq!(alu(AluOp::Mod, a, b).unwrap(), a % b);
        }
    }
}
