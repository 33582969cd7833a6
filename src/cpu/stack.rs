//! Stack discipline for the LS-8.
//!
//! The stack lives in main memory and grows downward from the top. R7
//! holds the stack pointer: push decrements it before writing, pop reads
//! before incrementing, so the pointer always addresses the most
//! recently pushed value.

use crate::cpu::memory::{Memory, MemoryError};
use crate::cpu::registers::Registers;
use thiserror::Error;

/// Power-on stack pointer position: the top of memory.
pub fn stack_top(mem: &Memory) -> u8 {
    (mem.size() - 1) as u8
}

/// Push a value onto the stack.
///
/// The stack pointer only moves once the write has succeeded.
pub fn push(regs: &mut Registers, mem: &mut Memory, value: u8) -> Result<(), StackError> {
    let sp = regs.sp();
    if sp == 0 {
        return Err(StackError::Overflow);
    }

    let new_sp = sp - 1;
    mem.write(new_sp as usize, value)?;
    regs.set_sp(new_sp);

    Ok(())
}

/// Pop the value at the top of the stack.
///
/// Popping with the stack pointer at (or above) its power-on position
/// means nothing has been pushed.
pub fn pop(regs: &mut Registers, mem: &Memory) -> Result<u8, StackError> {
    let sp = regs.sp();
    if sp >= stack_top(mem) {
        return Err(StackError::Underflow);
    }

    let value = mem.read(sp as usize)?;
    regs.set_sp(sp + 1);

    Ok(value)
}

/// Transfer control to a subroutine: push the return address, then point
/// the pc at the target. The pc is written only after the push succeeds,
/// so a full stack leaves it untouched.
pub fn call(
    regs: &mut Registers,
    mem: &mut Memory,
    return_addr: u8,
    target: u8,
) -> Result<(), StackError> {
    push(regs, mem, return_addr)?;
    regs.jump(target);

    Ok(())
}

/// Pop the return address; the caller assigns it to the pc.
pub fn ret(regs: &mut Registers, mem: &Memory) -> Result<u8, StackError> {
    pop(regs, mem)
}

/// Errors that can occur in stack operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StackError {
    /// Push would move the stack pointer below address 0.
    #[error("stack overflow: stack pointer cannot move below address 0")]
    Overflow,

    /// Pop with nothing on the stack.
    #[error("stack underflow: pop with nothing on the stack")]
    Underflow,

    #[error(transparent)]
    Memory(#[from] MemoryError),
}
