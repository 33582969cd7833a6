//! LS-8 memory subsystem.
//!
//! The LS-8 has a flat, byte-addressable memory of up to 256 cells.
//! Programs load at address 0; the stack grows downward from the top.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The number of memory cells in the historical LS-8.
pub const MEMORY_SIZE: usize = 256;

/// LS-8 memory: a flat array of bytes, fixed size at construction.
#[derive(Clone, Serialize, Deserialize)]
pub struct Memory {
    cells: Vec<u8>,
}

impl Memory {
    /// Create a full-size (256-byte) memory with all cells zeroed.
    pub fn new() -> Self {
        Self::with_size(MEMORY_SIZE)
    }

    /// Create a memory of `size` bytes, all zeroed.
    ///
    /// # Panics
    /// Panics unless `1 <= size <= 256`; every address must fit in an
    /// 8-bit register so the stack pointer can reach it.
    pub fn with_size(size: usize) -> Self {
        assert!(
            (1..=MEMORY_SIZE).contains(&size),
            "Memory size {} out of range (1-{})",
            size,
            MEMORY_SIZE
        );
        Self {
            cells: vec![0; size],
        }
    }

    /// The number of addressable cells.
    pub fn size(&self) -> usize {
        self.cells.len()
    }

    /// Read the byte at `addr`. Out-of-range addresses are an error,
    /// never a wrap-around.
    #[inline]
    pub fn read(&self, addr: usize) -> Result<u8, MemoryError> {
        self.cells
            .get(addr)
            .copied()
            .ok_or(MemoryError::OutOfRange {
                addr,
                size: self.cells.len(),
            })
    }

    /// Write a byte to `addr`.
    #[inline]
    pub fn write(&mut self, addr: usize, value: u8) -> Result<(), MemoryError> {
        let size = self.cells.len();
        match self.cells.get_mut(addr) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(MemoryError::OutOfRange { addr, size }),
        }
    }

    /// Clear all memory to zeros.
    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            *cell = 0;
        }
    }

    /// Load a program into memory starting at the given address.
    pub fn load_program(&mut self, start_addr: usize, program: &[u8]) -> Result<(), MemoryError> {
        if start_addr + program.len() > self.cells.len() {
            return Err(MemoryError::ProgramTooLarge {
                size: program.len(),
                available: self.cells.len().saturating_sub(start_addr),
            });
        }

        self.cells[start_addr..start_addr + program.len()].copy_from_slice(program);

        Ok(())
    }

    /// Dump memory contents (for debugging).
    pub fn dump(&self, start: usize, count: usize) -> Vec<(usize, u8)> {
        let end = (start + count).min(self.cells.len());
        (start..end).map(|i| (i, self.cells[i])).collect()
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Only show non-zero cells
        let non_zero = self.cells.iter().filter(|&&cell| cell != 0).count();

        f.debug_struct("Memory")
            .field("non_zero_cells", &non_zero)
            .field("total_cells", &self.cells.len())
            .finish()
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum MemoryError {
    /// Address is outside valid memory range.
    #[error("memory address {addr:#04x} out of range (0-{:#04x})", .size - 1)]
    OutOfRange { addr: usize, size: usize },

    /// Program is too large to fit in memory.
    #[error("program size {size} exceeds available space {available}")]
    ProgramTooLarge { size: usize, available: usize },
}
