//! CPU emulation for the LS-8.
//!
//! This module implements the complete LS-8 architecture:
//! - 256 byte-addressable memory cells
//! - 8 general-purpose registers (R7 doubles as the stack pointer),
//!   a program counter and a flags register
//! - a compact single-byte opcode set driven by a fetch-decode-execute
//!   loop

pub mod alu;
pub mod decode;
pub mod execute;
pub mod memory;
pub mod registers;
pub mod stack;

pub use decode::{decode, DecodeError, Instruction, Opcode};
pub use execute::{Cpu, CpuError, CpuState, Fault, Trace};
pub use memory::{Memory, MemoryError, MEMORY_SIZE};
pub use registers::{Flag, RegisterError, Registers, NUM_REGISTERS, SP};
pub use stack::StackError;
