//! LS-8 register file.
//!
//! The LS-8 has:
//! - R0-R7: eight general-purpose 8-bit registers
//! - PC: 8-bit program counter
//! - FL: flags register holding the result of the last compare
//!
//! R7 is reserved as the stack pointer by convention.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;

/// Number of general-purpose registers.
pub const NUM_REGISTERS: usize = 8;

/// Register index of the stack pointer (R7 by convention).
pub const SP: usize = 7;

/// Result classification of the last compare.
///
/// Exactly one of these is set after any CMP; no other instruction
/// touches the flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Flag {
    /// The compared registers were equal.
    Equal,
    /// The first register was greater.
    Greater,
    /// The first register was less.
    Less,
}

/// The LS-8 register file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Registers {
    /// R0-R7.
    general: [u8; NUM_REGISTERS],

    /// Program counter: address of the next instruction byte.
    pub pc: u8,

    /// Flags register; clear until the first CMP executes.
    flags: Option<Flag>,
}

impl Registers {
    /// Create a new register file with all values zeroed and flags clear.
    pub fn new() -> Self {
        Self {
            general: [0; NUM_REGISTERS],
            pc: 0,
            flags: None,
        }
    }

    /// Reset all registers to power-on state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Read a general-purpose register.
    pub fn get(&self, index: usize) -> Result<u8, RegisterError> {
        self.general
            .get(index)
            .copied()
            .ok_or(RegisterError::InvalidRegister { index })
    }

    /// Write a general-purpose register.
    pub fn set(&mut self, index: usize, value: u8) -> Result<(), RegisterError> {
        match self.general.get_mut(index) {
            Some(reg) => {
                *reg = value;
                Ok(())
            }
            None => Err(RegisterError::InvalidRegister { index }),
        }
    }

    /// All eight register values, for snapshots.
    pub fn all(&self) -> [u8; NUM_REGISTERS] {
        self.general
    }

    /// Current stack pointer (R7).
    pub fn sp(&self) -> u8 {
        self.general[SP]
    }

    /// Move the stack pointer (R7).
    pub fn set_sp(&mut self, value: u8) {
        self.general[SP] = value;
    }

    /// Set the flags from an unsigned comparison result.
    pub fn set_flags(&mut self, ordering: Ordering) {
        self.flags = Some(match ordering {
            Ordering::Equal => Flag::Equal,
            Ordering::Greater => Flag::Greater,
            Ordering::Less => Flag::Less,
        });
    }

    /// Test whether the given flag is the one currently set.
    pub fn test_flag(&self, flag: Flag) -> bool {
        self.flags == Some(flag)
    }

    /// Set the program counter to an absolute address.
    pub fn jump(&mut self, addr: u8) {
        self.pc = addr;
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur on register access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum RegisterError {
    /// Register index outside 0-7.
    #[error("invalid register index {index} (expected 0-7)")]
    InvalidRegister { index: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set() {
        let mut regs = Registers::new();

        regs.set(0, 42).unwrap();
        assert_eq!(regs.get(0).unwrap(), 42);
        assert_eq!(regs.get(1).unwrap(), 0);
    }

    #[test]
    fn test_invalid_register() {
        let mut regs = Registers::new();

        assert_eq!(
            regs.get(8),
            Err(RegisterError::InvalidRegister { index: 8 })
        );
        assert!(regs.set(8, 1).is_err());
    }

    #[test]
    fn test_sp_aliases_r7() {
        let mut regs = Registers::new();

        regs.set_sp(0xF4);
        assert_eq!(regs.get(SP).unwrap(), 0xF4);
        assert_eq!(regs.sp(), 0xF4);
    }

    #[test]
    fn test_flags_exclusive() {
        let mut regs = Registers::new();

        // Clear until the first compare
        assert!(!regs.test_flag(Flag::Equal));
        assert!(!regs.test_flag(Flag::Greater));
        assert!(!regs.test_flag(Flag::Less));

        regs.set_flags(Ordering::Equal);
        assert!(regs.test_flag(Flag::Equal));
        assert!(!regs.test_flag(Flag::Greater));
        assert!(!regs.test_flag(Flag::Less));

        regs.set_flags(Ordering::Less);
        assert!(regs.test_flag(Flag::Less));
        assert!(!regs.test_flag(Flag::Equal));
    }

    #[test]
    fn test_jump() {
        let mut regs = Registers::new();

        regs.jump(0x20);
        assert_eq!(regs.pc, 0x20);
    }
}
