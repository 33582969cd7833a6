//! Instruction decoder for the LS-8.
//!
//! Each instruction is a single opcode byte, optionally followed by one
//! or two operand bytes. The shape of an instruction is packed into the
//! opcode itself:
//!
//! ```text
//! AABCDDDD
//! ||||````- instruction identifier
//! |||`----- 1 if the instruction writes the pc directly
//! ||`------ 1 if the instruction is an ALU operation
//! ``------- number of operand bytes that follow (0-2)
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bit set when an instruction is handled by the ALU.
const ALU_MASK: u8 = 0b0010_0000;

/// Bit set when an instruction writes the pc itself.
const SETS_PC_MASK: u8 = 0b0001_0000;

/// The LS-8 instruction set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    /// Halt execution.
    Hlt = 0b0000_0001,
    /// Pop the return address off the stack into the pc.
    Ret = 0b0001_0001,
    /// Push a register value onto the stack.
    Push = 0b0100_0101,
    /// Pop the top of the stack into a register.
    Pop = 0b0100_0110,
    /// Print the decimal value of a register.
    Prn = 0b0100_0111,
    /// Call the subroutine whose address is in a register.
    Call = 0b0101_0000,
    /// Unconditional jump to the address in a register.
    Jmp = 0b0101_0100,
    /// Jump if the equal flag is set.
    Jeq = 0b0101_0101,
    /// Jump if the equal flag is clear.
    Jne = 0b0101_0110,
    /// Increment a register.
    Inc = 0b0110_0101,
    /// Decrement a register.
    Dec = 0b0110_0110,
    /// Load an immediate value into a register.
    Ldi = 0b1000_0010,
    /// Add two registers into the first.
    Add = 0b1010_0000,
    /// Multiply two registers into the first.
    Mul = 0b1010_0010,
    /// Compare two registers and set the flags.
    Cmp = 0b1010_0111,
}

impl Opcode {
    /// Every opcode, for table-driven decoding and tooling.
    pub const ALL: [Opcode; 15] = [
        Opcode::Hlt,
        Opcode::Ret,
        Opcode::Push,
        Opcode::Pop,
        Opcode::Prn,
        Opcode::Call,
        Opcode::Jmp,
        Opcode::Jeq,
        Opcode::Jne,
        Opcode::Inc,
        Opcode::Dec,
        Opcode::Ldi,
        Opcode::Add,
        Opcode::Mul,
        Opcode::Cmp,
    ];

    /// The byte encoding of this opcode.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Number of operand bytes following the opcode.
    pub fn operand_count(self) -> usize {
        (self.code() >> 6) as usize
    }

    /// Whether the instruction is executed by the ALU.
    pub fn is_alu(self) -> bool {
        self.code() & ALU_MASK != 0
    }

    /// Whether the instruction writes the pc itself. The execution
    /// engine skips the automatic pc advance for these.
    pub fn sets_pc(self) -> bool {
        self.code() & SETS_PC_MASK != 0
    }

    /// Assembly mnemonic.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Hlt => "HLT",
            Opcode::Ret => "RET",
            Opcode::Push => "PUSH",
            Opcode::Pop => "POP",
            Opcode::Prn => "PRN",
            Opcode::Call => "CALL",
            Opcode::Jmp => "JMP",
            Opcode::Jeq => "JEQ",
            Opcode::Jne => "JNE",
            Opcode::Inc => "INC",
            Opcode::Dec => "DEC",
            Opcode::Ldi => "LDI",
            Opcode::Add => "ADD",
            Opcode::Mul => "MUL",
            Opcode::Cmp => "CMP",
        }
    }

    /// Look up an opcode by its assembly mnemonic.
    pub fn from_mnemonic(mnemonic: &str) -> Option<Opcode> {
        Opcode::ALL.iter().copied().find(|op| op.mnemonic() == mnemonic)
    }
}

/// A decoded instruction: the opcode plus its operand bytes.
///
/// Operand slots beyond `opcode.operand_count()` are zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operands: [u8; 2],
}

/// Decode a fetched byte into an opcode.
///
/// Bytes that match no table entry are an [`DecodeError::IllegalOpcode`],
/// reported to the caller rather than skipped.
pub fn decode(byte: u8) -> Result<Opcode, DecodeError> {
    Opcode::ALL
        .iter()
        .copied()
        .find(|op| op.code() == byte)
        .ok_or(DecodeError::IllegalOpcode(byte))
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum DecodeError {
    #[error("illegal opcode {0:#04x}")]
    IllegalOpcode(u8),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_known_opcodes() {
        assert_eq!(decode(0x01).unwrap(), Opcode::Hlt);
        assert_eq!(decode(0x82).unwrap(), Opcode::Ldi);
        assert_eq!(decode(0x47).unwrap(), Opcode::Prn);
        assert_eq!(decode(0xA2).unwrap(), Opcode::Mul);

        for op in Opcode::ALL {
            assert_eq!(decode(op.code()).unwrap(), op);
        }
    }

    #[test]
    fn test_decode_illegal_opcode() {
        assert_eq!(decode(0xFF), Err(DecodeError::IllegalOpcode(0xFF)));
        assert_eq!(decode(0x00), Err(DecodeError::IllegalOpcode(0x00)));
    }

    #[test]
    fn test_operand_counts() {
        assert_eq!(Opcode::Hlt.operand_count(), 0);
        assert_eq!(Opcode::Ret.operand_count(), 0);
        assert_eq!(Opcode::Prn.operand_count(), 1);
        assert_eq!(Opcode::Call.operand_count(), 1);
        assert_eq!(Opcode::Ldi.operand_count(), 2);
        assert_eq!(Opcode::Mul.operand_count(), 2);
    }

    #[test]
    fn test_alu_classification() {
        let alu_ops = [Opcode::Add, Opcode::Mul, Opcode::Inc, Opcode::Dec, Opcode::Cmp];

        for op in Opcode::ALL {
            assert_eq!(op.is_alu(), alu_ops.contains(&op), "{:?}", op);
        }
    }

    #[test]
    fn test_pc_setters() {
        let pc_setters = [Opcode::Call, Opcode::Ret, Opcode::Jmp, Opcode::Jeq, Opcode::Jne];

        for op in Opcode::ALL {
            assert_eq!(op.sets_pc(), pc_setters.contains(&op), "{:?}", op);
        }
    }

    #[test]
    fn test_mnemonic_roundtrip() {
        for op in Opcode::ALL {
            assert_eq!(Opcode::from_mnemonic(op.mnemonic()), Some(op));
        }
        assert_eq!(Opcode::from_mnemonic("NOP"), None);
    }
}
