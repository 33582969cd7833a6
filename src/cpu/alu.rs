//! Arithmetic/logic unit.
//!
//! Pure register-to-register operations keyed by opcode. The ALU never
//! touches the program counter or memory; control flow and loads stay
//! in the execution engine.

use crate::cpu::decode::Opcode;
use crate::cpu::registers::{RegisterError, Registers};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Apply an ALU opcode to the register file.
///
/// `a` and `b` are register indices. Single-operand opcodes (INC, DEC)
/// ignore `b`. Arithmetic wraps modulo 256; CMP sets exactly one flag
/// from an unsigned comparison.
pub fn execute(regs: &mut Registers, op: Opcode, a: usize, b: usize) -> Result<(), AluError> {
    match op {
        Opcode::Add => {
            let result = regs.get(a)?.wrapping_add(regs.get(b)?);
            regs.set(a, result)?;
        }
        Opcode::Mul => {
            let result = regs.get(a)?.wrapping_mul(regs.get(b)?);
            regs.set(a, result)?;
        }
        Opcode::Inc => {
            let result = regs.get(a)?.wrapping_add(1);
            regs.set(a, result)?;
        }
        Opcode::Dec => {
            let result = regs.get(a)?.wrapping_sub(1);
            regs.set(a, result)?;
        }
        Opcode::Cmp => {
            let ordering = regs.get(a)?.cmp(&regs.get(b)?);
            regs.set_flags(ordering);
        }
        other => return Err(AluError::UnsupportedOperation(other)),
    }

    Ok(())
}

/// Errors that can occur in the ALU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum AluError {
    /// The opcode is not an ALU operation.
    #[error("unsupported ALU operation {}", .0.mnemonic())]
    UnsupportedOperation(Opcode),

    #[error(transparent)]
    Register(#[from] RegisterError),
}
