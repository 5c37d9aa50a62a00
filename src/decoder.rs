//! Opcode decoding.
//!
//! An LS-8 opcode byte is laid out as `AABCDDDD`:
//!
//! | Bits | Meaning |
//! |------|---------|
//! | `AA` | number of operand bytes that follow |
//! | `B`  | ALU-class instruction |
//! | `C`  | instruction sets the PC itself |
//! | `DDDD` | instruction identifier |
//!
//! Decoding is keyed on the whole byte, so two distinct opcodes can never
//! land on the same instruction. The layout is only consulted to tell an
//! unsupported ALU function apart from a plain unknown opcode.

use crate::alu::AluOp;
use crate::error::CpuError;

const ALU_CLASS: u8 = 0b0010_0000;
const SETS_PC: u8 = 0b0001_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Nop,
    Hlt,
    Ldi,
    Ld,
    St,
    Prn,
    Pra,
    Push,
    Pop,
    Call,
    Ret,
    Jmp,
    Jeq,
    Jne,
    Jgt,
    Jlt,
    Jle,
    Jge,
    Cmp,
    Alu(AluOp),
}

impl Instruction {
    pub fn decode(opcode: u8) -> Result<Instruction, CpuError> {
        let instruction = match opcode {
            0x00 => Instruction::Nop,
            0x01 => Instruction::Hlt,
            0x11 => Instruction::Ret,
            0x45 => Instruction::Push,
            0x46 => Instruction::Pop,
            0x47 => Instruction::Prn,
            0x48 => Instruction::Pra,
            0x50 => Instruction::Call,
            0x54 => Instruction::Jmp,
            0x55 => Instruction::Jeq,
            0x56 => Instruction::Jne,
            0x57 => Instruction::Jgt,
            0x58 => Instruction::Jlt,
            0x59 => Instruction::Jle,
            0x5A => Instruction::Jge,
            0x82 => Instruction::Ldi,
            0x83 => Instruction::Ld,
            0x84 => Instruction::St,
            0xA7 => Instruction::Cmp,
            _ if opcode & (ALU_CLASS | SETS_PC) == ALU_CLASS => {
                return decode_alu(opcode);
            }
            _ => return Err(CpuError::UnknownOpcode(opcode)),
        };
        Ok(instruction)
    }

    pub fn opcode(self) -> u8 {
        match self {
            Instruction::Nop => 0x00,
            Instruction::Hlt => 0x01,
            Instruction::Ret => 0x11,
            Instruction::Push => 0x45,
            Instruction::Pop => 0x46,
            Instruction::Prn => 0x47,
            Instruction::Pra => 0x48,
            Instruction::Call => 0x50,
            Instruction::Jmp => 0x54,
            Instruction::Jeq => 0x55,
            Instruction::Jne => 0x56,
            Instruction::Jgt => 0x57,
            Instruction::Jlt => 0x58,
            Instruction::Jle => 0x59,
            Instruction::Jge => 0x5A,
            Instruction::Ldi => 0x82,
            Instruction::Ld => 0x83,
            Instruction::St => 0x84,
            Instruction::Cmp => 0xA7,
            Instruction::Alu(op) => {
                let arity: u8 = if op.is_unary() { 1 } else { 2 };
                (arity << 6) | ALU_CLASS | op.id()
            }
        }
    }

    /// Operand bytes that follow the opcode in memory.
    pub fn operand_count(self) -> usize {
        match self {
            Instruction::Nop | Instruction::Hlt | Instruction::Ret => 0,
            Instruction::Prn
            | Instruction::Pra
            | Instruction::Push
            | Instruction::Pop
            | Instruction::Call
            | Instruction::Jmp
            | Instruction::Jeq
            | Instruction::Jne
            | Instruction::Jgt
            | Instruction::Jlt
            | Instruction::Jle
            | Instruction::Jge => 1,
            Instruction::Ldi | Instruction::Ld | Instruction::St | Instruction::Cmp => 2,
            Instruction::Alu(op) if op.is_unary() => 1,
            Instruction::Alu(_) => 2,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Instruction::Nop => "NOP",
            Instruction::Hlt => "HLT",
            Instruction::Ldi => "LDI",
            Instruction::Ld => "LD",
            Instruction::St => "ST",
            Instruction::Prn => "PRN",
            Instruction::Pra => "PRA",
            Instruction::Push => "PUSH",
            Instruction::Pop => "POP",
            Instruction::Call => "CALL",
            Instruction::Ret => "RET",
            Instruction::Jmp => "JMP",
            Instruction::Jeq => "JEQ",
            Instruction::Jne => "JNE",
            Instruction::Jgt => "JGT",
            Instruction::Jlt => "JLT",
            Instruction::Jle => "JLE",
            Instruction::Jge => "JGE",
            Instruction::Cmp => "CMP",
            Instruction::Alu(op) => op.mnemonic(),
        }
    }
}

// An ALU-class byte whose function id is unknown, or whose operand-count
// bits disagree with that function, is an unsupported ALU operation.
fn decode_alu(opcode: u8) -> Result<Instruction, CpuError> {
    let op = AluOp::from_id(opcode & 0x0F).ok_or(CpuError::UnsupportedAluOperation(opcode))?;
    let instruction = Instruction::Alu(op);
    if instruction.opcode() != opcode {
        return Err(CpuError::UnsupportedAluOperation(opcode));
    }
    Ok(instruction)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_opcodes() {
        assert_eq!(Instruction::decode(0b1000_0010), Ok(Instruction::Ldi));
        assert_eq!(Instruction::decode(0b0100_0111), Ok(Instruction::Prn));
        assert_eq!(Instruction::decode(0b0000_0001), Ok(Instruction::Hlt));
        assert_eq!(Instruction::decode(0b1010_0010), Ok(Instruction::Alu(AluOp::Mul)));
        assert_eq!(Instruction::decode(0b0110_1001), Ok(Instruction::Alu(AluOp::Not)));
        assert_eq!(Instruction::decode(0b1010_0111), Ok(Instruction::Cmp));
    }

    #[test]
    fn test_operand_count_matches_encoding_for_every_byte() {
        let mut decoded = 0;
        for opcode in 0..=255u8 {
            if let Ok(instruction) = Instruction::decode(opcode) {
                decoded += 1;
                assert_eq!(
                    instruction.operand_count(),
                    (opcode >> 6) as usize,
                    "operand count for {}",
                    instruction.mnemonic()
                );
                assert_eq!(instruction.opcode(), opcode);
            }
        }
        assert_eq!(decoded, 32);
    }

    #[test]
    fn test_leading_zero_opcodes_do_not_alias() {
        // 0x01 and 0x11 render alike once leading zeros are dropped in
        // some textual forms; they are different instructions.
        assert_eq!(Instruction::decode(0x01), Ok(Instruction::Hlt));
        assert_eq!(Instruction::decode(0x11), Ok(Instruction::Ret));
        assert_eq!(Instruction::decode(0x00), Ok(Instruction::Nop));
    }

    #[test]
    fn test_unknown_and_unsupported() {
        // INT / IRET are not implemented
        assert_eq!(Instruction::decode(0x52), Err(CpuError::UnknownOpcode(0x52)));
        assert_eq!(Instruction::decode(0x13), Err(CpuError::UnknownOpcode(0x13)));
        assert_eq!(Instruction::decode(0xFF), Err(CpuError::UnknownOpcode(0xFF)));
        assert_eq!(
            Instruction::decode(0xAE),
            Err(CpuError::UnsupportedAluOperation(0xAE))
        );
        // NOT is unary; a two-operand encoding of it is not an ALU function
        assert_eq!(
            Instruction::decode(0xA9),
            Err(CpuError::UnsupportedAluOperation(0xA9))
        );
    }

    #[test]
    fn test_mnemonics() {
        assert_eq!(Instruction::decode(0x50).map(Instruction::mnemonic), Ok("CALL"));
        assert_eq!(Instruction::decode(0xA4).map(Instruction::mnemonic), Ok("MOD"));
        assert_eq!(Instruction::decode(0x11).map(Instruction::mnemonic), Ok("RET"));
    }
}
