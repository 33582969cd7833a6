//! Execution engine for the LS-8.
//!
//! Implements the fetch-decode-execute cycle and all instruction
//! behaviors, dispatching arithmetic to the ALU and stack traffic to the
//! stack manager.

use crate::cpu::alu::{self, AluError};
use crate::cpu::decode::{self, DecodeError, Instruction, Opcode};
use crate::cpu::memory::{Memory, MemoryError};
use crate::cpu::registers::{Flag, RegisterError, Registers, NUM_REGISTERS};
use crate::cpu::stack::{self, StackError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Write};
use thiserror::Error;

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// Loaded (or freshly reset) and waiting to run.
    Ready,
    /// Executing instructions.
    Running,
    /// Executed HLT. Terminal, and a success.
    Halted,
    /// Hit an unrecoverable condition. Terminal, with the reason.
    Faulted(Fault),
}

/// Why the CPU faulted.
///
/// Every fault is a property of the loaded program, not of the host:
/// the engine stops and reports it rather than exiting the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum Fault {
    #[error("memory address {addr:#04x} out of range")]
    OutOfRange { addr: usize },

    #[error("invalid register index {index}")]
    InvalidRegister { index: usize },

    #[error("illegal opcode {opcode:#04x}")]
    IllegalOpcode { opcode: u8 },

    #[error("stack overflow")]
    StackOverflow,

    #[error("stack underflow")]
    StackUnderflow,

    #[error("unsupported ALU operation")]
    UnsupportedOperation,
}

/// The LS-8 CPU.
pub struct Cpu {
    /// CPU registers.
    pub regs: Registers,
    /// Main memory.
    pub mem: Memory,
    /// Current execution state.
    pub state: CpuState,
    /// Instruction count (for profiling and run ceilings).
    pub cycles: u64,
    /// Last executed instruction (for debugging).
    last_instr: Option<Instruction>,
    /// Sink for PRN output.
    output: Box<dyn Write>,
}

impl Cpu {
    /// Create a new CPU with zeroed state, printing PRN output to stdout.
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// Create a CPU that sends PRN output to the given sink.
    pub fn with_output(output: Box<dyn Write>) -> Self {
        let mem = Memory::new();
        let mut regs = Registers::new();
        regs.set_sp(stack::stack_top(&mem));

        Self {
            regs,
            mem,
            state: CpuState::Ready,
            cycles: 0,
            last_instr: None,
            output,
        }
    }

    /// Reset the CPU to power-on state: zeroed registers and memory,
    /// stack pointer at the top of memory.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.mem.clear();
        self.regs.set_sp(stack::stack_top(&self.mem));
        self.state = CpuState::Ready;
        self.cycles = 0;
        self.last_instr = None;
    }

    /// Load a program at address 0. The CPU stays `Ready` until run.
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), MemoryError> {
        self.mem.load_program(0, program)
    }

    /// Execute a single instruction.
    ///
    /// Returns the instruction that was executed. Any fault transitions
    /// the CPU to `Faulted` and is also returned as the error.
    pub fn step(&mut self) -> Result<Instruction, CpuError> {
        match self.state {
            CpuState::Ready => self.state = CpuState::Running,
            CpuState::Running => {}
            state => return Err(CpuError::NotRunning(state)),
        }

        match self.cycle() {
            Ok(instr) => {
                self.cycles += 1;
                self.last_instr = Some(instr);
                Ok(instr)
            }
            Err(err) => {
                if let Some(fault) = err.fault() {
                    self.state = CpuState::Faulted(fault);
                }
                Err(err)
            }
        }
    }

    /// Run until halt or fault.
    ///
    /// Returns the number of instructions executed.
    pub fn run(&mut self) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;

        while matches!(self.state, CpuState::Ready | CpuState::Running) {
            self.step()?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Run for at most `max_cycles` instructions.
    ///
    /// An instruction-count ceiling guards tests and harnesses against
    /// programs that never halt.
    pub fn run_limited(&mut self, max_cycles: u64) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;
        let limit = self.cycles + max_cycles;

        while matches!(self.state, CpuState::Ready | CpuState::Running) && self.cycles < limit {
            self.step()?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// One fetch-decode-execute cycle.
    fn cycle(&mut self) -> Result<Instruction, CpuError> {
        // Fetch
        let pc = self.regs.pc;
        let raw = self.mem.read(pc as usize)?;

        // Decode
        let opcode = decode::decode(raw)?;

        let mut operands = [0u8; 2];
        for (i, slot) in operands.iter_mut().take(opcode.operand_count()).enumerate() {
            *slot = self.mem.read(pc as usize + 1 + i)?;
        }

        // Address of the instruction after this one; also the return
        // address a CALL pushes.
        let next_pc = pc.wrapping_add(1 + opcode.operand_count() as u8);

        // Execute
        let instr = Instruction { opcode, operands };
        self.execute(instr, next_pc)?;

        if !opcode.sets_pc() {
            self.regs.pc = next_pc;
        }

        Ok(instr)
    }

    /// Execute a decoded instruction.
    ///
    /// Instructions whose opcode has `sets_pc()` must leave the pc fully
    /// assigned, including on fall-through.
    fn execute(&mut self, instr: Instruction, next_pc: u8) -> Result<(), CpuError> {
        let [a, b] = instr.operands;

        match instr.opcode {
            Opcode::Ldi => {
                self.regs.set(a as usize, b)?;
            }

            Opcode::Prn => {
                let value = self.regs.get(a as usize)?;
                writeln!(self.output, "{}", value)?;
            }

            Opcode::Add | Opcode::Mul | Opcode::Inc | Opcode::Dec | Opcode::Cmp => {
                alu::execute(&mut self.regs, instr.opcode, a as usize, b as usize)?;
            }

            Opcode::Push => {
                let value = self.regs.get(a as usize)?;
                stack::push(&mut self.regs, &mut self.mem, value)?;
            }

            Opcode::Pop => {
                let value = stack::pop(&mut self.regs, &self.mem)?;
                self.regs.set(a as usize, value)?;
            }

            Opcode::Call => {
                let target = self.regs.get(a as usize)?;
                stack::call(&mut self.regs, &mut self.mem, next_pc, target)?;
            }

            Opcode::Ret => {
                let addr = stack::ret(&mut self.regs, &self.mem)?;
                self.regs.jump(addr);
            }

            Opcode::Jmp => {
                let target = self.regs.get(a as usize)?;
                self.regs.jump(target);
            }

            Opcode::Jeq => {
                let target = self.regs.get(a as usize)?;
                if self.regs.test_flag(Flag::Equal) {
                    self.regs.jump(target);
                } else {
                    self.regs.jump(next_pc);
                }
            }

            Opcode::Jne => {
                let target = self.regs.get(a as usize)?;
                if !self.regs.test_flag(Flag::Equal) {
                    self.regs.jump(target);
                } else {
                    self.regs.jump(next_pc);
                }
            }

            Opcode::Hlt => {
                self.state = CpuState::Halted;
            }
        }

        Ok(())
    }

    /// Snapshot the pc, the three bytes at the pc, and all registers.
    ///
    /// Read-only; bytes past the end of memory read as zero.
    pub fn trace(&self) -> Trace {
        let mut window = [0u8; 3];
        for (i, slot) in window.iter_mut().enumerate() {
            *slot = self.mem.read(self.regs.pc as usize + i).unwrap_or(0);
        }

        Trace {
            pc: self.regs.pc,
            window,
            registers: self.regs.all(),
        }
    }

    /// Get the last executed instruction.
    pub fn last_instruction(&self) -> Option<Instruction> {
        self.last_instr
    }

    /// Check if the CPU is halted.
    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    /// Check if the CPU can still execute instructions.
    pub fn is_running(&self) -> bool {
        matches!(self.state, CpuState::Ready | CpuState::Running)
    }

    /// The fault reason, if the CPU is faulted.
    pub fn fault(&self) -> Option<Fault> {
        match self.state {
            CpuState::Faulted(fault) => Some(fault),
            _ => None,
        }
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Cpu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .finish()
    }
}

/// Read-only diagnostic snapshot of the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    /// Program counter at the time of the snapshot.
    pub pc: u8,
    /// The three memory bytes starting at the pc.
    pub window: [u8; 3],
    /// All eight register values.
    pub registers: [u8; NUM_REGISTERS],
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TRACE: {:02X} | {:02X} {:02X} {:02X} |",
            self.pc, self.window[0], self.window[1], self.window[2]
        )?;
        for value in self.registers {
            write!(f, " {:02X}", value)?;
        }
        Ok(())
    }
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Error)]
pub enum CpuError {
    #[error("CPU not running: {0:?}")]
    NotRunning(CpuState),

    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("register error: {0}")]
    Register(#[from] RegisterError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("stack error: {0}")]
    Stack(#[from] StackError),

    #[error("ALU error: {0}")]
    Alu(#[from] AluError),

    #[error("output sink error: {0}")]
    Output(#[from] io::Error),
}

impl CpuError {
    /// The terminal fault this error maps to, if it is a fault of the
    /// running program rather than a host-side condition.
    pub fn fault(&self) -> Option<Fault> {
        match self {
            CpuError::Memory(MemoryError::OutOfRange { addr, .. }) => {
                Some(Fault::OutOfRange { addr: *addr })
            }
            CpuError::Memory(MemoryError::ProgramTooLarge { .. }) => None,

            CpuError::Register(RegisterError::InvalidRegister { index }) => {
                Some(Fault::InvalidRegister { index: *index })
            }

            CpuError::Decode(DecodeError::IllegalOpcode(opcode)) => {
                Some(Fault::IllegalOpcode { opcode: *opcode })
            }

            CpuError::Stack(StackError::Overflow) => Some(Fault::StackOverflow),
            CpuError::Stack(StackError::Underflow) => Some(Fault::StackUnderflow),
            CpuError::Stack(StackError::Memory(MemoryError::OutOfRange { addr, .. })) => {
                Some(Fault::OutOfRange { addr: *addr })
            }
            CpuError::Stack(StackError::Memory(_)) => None,

            CpuError::Alu(AluError::UnsupportedOperation(_)) => {
                Some(Fault::UnsupportedOperation)
            }
            CpuError::Alu(AluError::Register(RegisterError::InvalidRegister { index })) => {
                Some(Fault::InvalidRegister { index: *index })
            }

            CpuError::NotRunning(_) | CpuError::Output(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// A cloneable sink so tests can read PRN output back out of the CPU.
    #[derive(Clone, Default)]
    struct SharedBuf(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.borrow().clone()).unwrap()
        }
    }

    fn cpu_with_buf() -> (Cpu, SharedBuf) {
        let buf = SharedBuf::default();
        (Cpu::with_output(Box::new(buf.clone())), buf)
    }

    #[test]
    fn test_cpu_halt() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[0x01]).unwrap();

        let executed = cpu.run().unwrap();

        assert_eq!(executed, 1);
        assert!(cpu.is_halted());
    }

    #[test]
    fn test_print8_scenario() {
        // LDI R0,8; PRN R0; HLT
        let (mut cpu, buf) = cpu_with_buf();
        cpu.load_program(&[0x82, 0, 8, 0x47, 0, 0x01]).unwrap();

        cpu.run().unwrap();

        assert_eq!(buf.contents(), "8\n");
        assert_eq!(cpu.state, CpuState::Halted);
    }

    #[test]
    fn test_mul_scenario() {
        // LDI R0,8; LDI R1,9; MUL R0,R1; PRN R0; HLT
        let (mut cpu, buf) = cpu_with_buf();
        cpu.load_program(&[0x82, 0, 8, 0x82, 1, 9, 0xA2, 0, 1, 0x47, 0, 0x01])
            .unwrap();

        cpu.run().unwrap();

        assert_eq!(buf.contents(), "72\n");
    }

    #[test]
    fn test_push_pop_transfer() {
        // PUSH R0; POP R1; PRN R1; HLT, with R0 preset to 42
        let (mut cpu, buf) = cpu_with_buf();
        cpu.regs.set(0, 42).unwrap();
        cpu.load_program(&[0x45, 0, 0x46, 1, 0x47, 1, 0x01]).unwrap();

        cpu.run().unwrap();

        assert_eq!(buf.contents(), "42\n");
        assert_eq!(cpu.regs.get(1).unwrap(), 42);
    }

    #[test]
    fn test_illegal_opcode_faults() {
        let (mut cpu, buf) = cpu_with_buf();
        cpu.load_program(&[0xFF]).unwrap();

        let err = cpu.run().unwrap_err();

        assert_eq!(err.fault(), Some(Fault::IllegalOpcode { opcode: 0xFF }));
        assert_eq!(
            cpu.state,
            CpuState::Faulted(Fault::IllegalOpcode { opcode: 0xFF })
        );
        assert_eq!(buf.contents(), "");
    }

    #[test]
    fn test_faulted_is_terminal() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[0xFF]).unwrap();

        assert!(cpu.run().is_err());
        assert!(matches!(cpu.step(), Err(CpuError::NotRunning(_))));
    }

    #[test]
    fn test_halted_is_terminal() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[0x01]).unwrap();
        cpu.run().unwrap();

        assert!(matches!(
            cpu.step(),
            Err(CpuError::NotRunning(CpuState::Halted))
        ));
    }

    #[test]
    fn test_call_ret_returns_past_operand() {
        // 0: LDI R0,6
        // 3: CALL R0   -> return address is 5
        // 5: HLT
        // 6: RET
        let mut cpu = Cpu::new();
        cpu.load_program(&[0x82, 0, 6, 0x50, 0, 0x01, 0x11]).unwrap();

        cpu.step().unwrap(); // LDI
        cpu.step().unwrap(); // CALL
        assert_eq!(cpu.regs.pc, 6);

        cpu.step().unwrap(); // RET
        assert_eq!(cpu.regs.pc, 5);

        cpu.run().unwrap();
        assert!(cpu.is_halted());
    }

    #[test]
    fn test_jmp() {
        // 0: LDI R0,5; 3: JMP R0; 5: HLT
        let mut cpu = Cpu::new();
        cpu.load_program(&[0x82, 0, 5, 0x54, 0, 0x01]).unwrap();

        cpu.run().unwrap();

        assert!(cpu.is_halted());
        assert_eq!(cpu.cycles, 3);
    }

    #[test]
    fn test_jeq_taken_and_jne_fall_through() {
        //  0: LDI R0,10
        //  3: LDI R1,10
        //  6: CMP R0,R1
        //  9: LDI R2,17
        // 12: JEQ R2     -> taken
        // 14: LDI R3,99  -> skipped
        // 17: JNE R2     -> equal flag still set, falls through to 19
        // 19: HLT
        let mut cpu = Cpu::new();
        cpu.load_program(&[
            0x82, 0, 10, 0x82, 1, 10, 0xA7, 0, 1, 0x82, 2, 17, 0x55, 2, 0x82, 3, 99, 0x56, 2,
            0x01,
        ])
        .unwrap();

        cpu.run().unwrap();

        assert!(cpu.is_halted());
        assert_eq!(cpu.regs.get(3).unwrap(), 0);
    }

    #[test]
    fn test_jeq_fall_through_when_unequal() {
        //  0: LDI R0,1
        //  3: LDI R1,2
        //  6: CMP R0,R1
        //  9: LDI R2,16
        // 12: JEQ R2     -> not taken, falls through
        // 14: PRN R0
        // 16: HLT
        let (mut cpu, buf) = cpu_with_buf();
        cpu.load_program(&[
            0x82, 0, 1, 0x82, 1, 2, 0xA7, 0, 1, 0x82, 2, 16, 0x55, 2, 0x47, 0, 0x01,
        ])
        .unwrap();

        cpu.run().unwrap();

        assert_eq!(buf.contents(), "1\n");
    }

    #[test]
    fn test_run_limited_stops_runaway() {
        // 0: LDI R0,3; 3: JMP R0 (spins forever)
        let mut cpu = Cpu::new();
        cpu.load_program(&[0x82, 0, 3, 0x54, 0]).unwrap();

        let executed = cpu.run_limited(100).unwrap();

        assert_eq!(executed, 100);
        assert_eq!(cpu.state, CpuState::Running);
    }

    #[test]
    fn test_stack_underflow_faults() {
        // POP R0 with nothing pushed
        let mut cpu = Cpu::new();
        cpu.load_program(&[0x46, 0]).unwrap();

        let err = cpu.run().unwrap_err();

        assert_eq!(err.fault(), Some(Fault::StackUnderflow));
        assert_eq!(cpu.state, CpuState::Faulted(Fault::StackUnderflow));
    }

    #[test]
    fn test_invalid_register_faults() {
        // PRN R9
        let mut cpu = Cpu::new();
        cpu.load_program(&[0x47, 9, 0x01]).unwrap();

        cpu.run().unwrap_err();

        assert_eq!(
            cpu.state,
            CpuState::Faulted(Fault::InvalidRegister { index: 9 })
        );
    }

    #[test]
    fn test_trace_snapshot() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[0x82, 0, 8, 0x01]).unwrap();

        let trace = cpu.trace();

        assert_eq!(trace.pc, 0);
        assert_eq!(trace.window, [0x82, 0, 8]);
        assert_eq!(trace.registers[7], 0xFF);

        // Snapshots must not mutate state
        assert_eq!(cpu.state, CpuState::Ready);
        assert_eq!(cpu.trace(), trace);
    }

    #[test]
    fn test_trace_display_format() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[0x82, 0, 8, 0x01]).unwrap();

        let line = cpu.trace().to_string();

        assert!(line.starts_with("TRACE: 00 | 82 00 08 |"));
        assert!(line.ends_with("FF"));
    }

    #[test]
    fn test_reset_restores_power_on() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[0x82, 0, 8, 0x01]).unwrap();
        cpu.run().unwrap();

        cpu.reset();

        assert_eq!(cpu.state, CpuState::Ready);
        assert_eq!(cpu.cycles, 0);
        assert_eq!(cpu.regs.pc, 0);
        assert_eq!(cpu.regs.sp(), 0xFF);
        assert_eq!(cpu.mem.read(0).unwrap(), 0);
    }
}
