//! Simple assembler for LS-8 programs.
//!
//! Syntax:
//! ```text
//! ; Comment (# also works)
//! LABEL:              ; Define a label
//!     LDI R0,8        ; Load an immediate into a register
//!     LDI R1,LABEL    ; Labels resolve to their byte address
//!     ADD R0,R0
//!     CALL R1
//!     HLT
//!     DS8 42          ; Define a data byte
//! ```

use crate::cpu::decode::Opcode;
use crate::cpu::memory::MEMORY_SIZE;
use std::collections::HashMap;
use thiserror::Error;

/// Assemble source code to program bytes.
pub fn assemble(source: &str) -> Result<Vec<u8>, AssemblerError> {
    let mut asm = Assembler::new();
    asm.assemble(source)
}

/// The assembler state.
struct Assembler {
    /// Symbol table (label -> byte address).
    symbols: HashMap<String, u8>,
    /// Pending references (output_index, label, source_line).
    pending: Vec<(usize, String, usize)>,
    /// Output bytes.
    output: Vec<u8>,
}

impl Assembler {
    fn new() -> Self {
        Self {
            symbols: HashMap::new(),
            pending: Vec::new(),
            output: Vec::new(),
        }
    }

    fn assemble(&mut self, source: &str) -> Result<Vec<u8>, AssemblerError> {
        // Pass 1: Collect labels and generate code
        for (line_num, line) in source.lines().enumerate() {
            self.process_line(line, line_num + 1)?;
        }

        if self.output.len() > MEMORY_SIZE {
            return Err(AssemblerError::ProgramTooLarge {
                size: self.output.len(),
            });
        }

        // Pass 2: Resolve forward references
        self.resolve_references()?;

        Ok(self.output.clone())
    }

    fn process_line(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        // Remove comments, either style
        let line = match line.find([';', '#']) {
            Some(idx) => &line[..idx],
            None => line,
        };
        let line = line.trim();

        if line.is_empty() {
            return Ok(());
        }

        // Check for label definition
        if let Some(colon_idx) = line.find(':') {
            let label = line[..colon_idx].trim().to_uppercase();
            if !label.is_empty() {
                self.symbols.insert(label, self.output.len() as u8);
            }

            // Process rest of line if any
            let rest = line[colon_idx + 1..].trim();
            if !rest.is_empty() {
                return self.process_instruction(rest, line_num);
            }
            return Ok(());
        }

        self.process_instruction(line, line_num)
    }

    fn process_instruction(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        let mut parts = line.splitn(2, char::is_whitespace);
        let mnemonic = parts.next().unwrap_or("").to_uppercase();
        let rest = parts.next().unwrap_or("");

        let operands: Vec<&str> = rest
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        // Data directive
        if mnemonic == "DS8" {
            if operands.len() != 1 {
                return Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: "DS8 takes one value".into(),
                });
            }
            let value = self.parse_value(operands[0], line_num)?;
            self.emit(value);
            return Ok(());
        }

        let opcode =
            Opcode::from_mnemonic(&mnemonic).ok_or_else(|| AssemblerError::UnknownMnemonic {
                line: line_num,
                mnemonic: mnemonic.clone(),
            })?;

        if operands.len() != opcode.operand_count() {
            return Err(AssemblerError::SyntaxError {
                line: line_num,
                message: format!(
                    "{} takes {} operand(s), found {}",
                    mnemonic,
                    opcode.operand_count(),
                    operands.len()
                ),
            });
        }

        self.emit(opcode.code());

        for (i, operand) in operands.iter().enumerate() {
            // LDI's second operand is an immediate; every other operand
            // is a register
            let byte = if opcode == Opcode::Ldi && i == 1 {
                self.parse_value(operand, line_num)?
            } else {
                self.parse_register(operand, line_num)?
            };
            self.emit(byte);
        }

        Ok(())
    }

    fn parse_register(&self, operand: &str, line_num: usize) -> Result<u8, AssemblerError> {
        let index = operand
            .strip_prefix(['R', 'r'])
            .and_then(|n| n.parse::<u8>().ok())
            .ok_or_else(|| AssemblerError::SyntaxError {
                line: line_num,
                message: format!("expected a register (R0-R7), found {:?}", operand),
            })?;

        if index > 7 {
            return Err(AssemblerError::ValueOutOfRange {
                line: line_num,
                value: index as i64,
            });
        }

        Ok(index)
    }

    fn parse_value(&mut self, operand: &str, line_num: usize) -> Result<u8, AssemblerError> {
        let parsed = if let Some(hex) = operand.strip_prefix("0x").or_else(|| operand.strip_prefix("0X")) {
            i64::from_str_radix(hex, 16).ok()
        } else if let Some(bin) = operand.strip_prefix("0b").or_else(|| operand.strip_prefix("0B")) {
            i64::from_str_radix(bin, 2).ok()
        } else {
            operand.parse::<i64>().ok()
        };

        if let Some(value) = parsed {
            if !(0..=255).contains(&value) {
                return Err(AssemblerError::ValueOutOfRange {
                    line: line_num,
                    value,
                });
            }
            return Ok(value as u8);
        }

        // Must be a label reference - emit a placeholder and patch it in
        // pass 2
        self.pending
            .push((self.output.len(), operand.to_uppercase(), line_num));
        Ok(0)
    }

    fn emit(&mut self, byte: u8) {
        self.output.push(byte);
    }

    fn resolve_references(&mut self) -> Result<(), AssemblerError> {
        for (out_idx, label, line_num) in &self.pending {
            let addr = self
                .symbols
                .get(label)
                .ok_or_else(|| AssemblerError::UndefinedLabel {
                    line: *line_num,
                    label: label.clone(),
                })?;

            self.output[*out_idx] = *addr;
        }
        Ok(())
    }
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("undefined label on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("value out of range on line {line}: {value}")]
    ValueOutOfRange { line: usize, value: i64 },

    #[error("program size {size} exceeds memory ({} bytes)", MEMORY_SIZE)]
    ProgramTooLarge { size: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_simple() {
        let source = r#"
            ; Print the number 8
            LDI R0,8
            PRN R0
            HLT
        "#;

        let result = assemble(source).unwrap();
        assert_eq!(result, vec![0x82, 0, 8, 0x47, 0, 0x01]);
    }

    #[test]
    fn test_assemble_with_labels() {
        let source = r#"
            LDI R1,SUB      ; forward reference
            CALL R1
            HLT
        SUB:
            RET
        "#;

        let result = assemble(source).unwrap();
        // SUB lands at byte 6
        assert_eq!(result, vec![0x82, 1, 6, 0x50, 1, 0x01, 0x11]);
    }

    #[test]
    fn test_assemble_data() {
        let source = r#"
            DS8 42
            DS8 0xFF
            DS8 0b1010
        "#;

        let result = assemble(source).unwrap();
        assert_eq!(result, vec![42, 255, 10]);
    }

    #[test]
    fn test_assemble_hash_comments() {
        let result = assemble("HLT # same comment style as .ls8 images\n").unwrap();
        assert_eq!(result, vec![0x01]);
    }

    #[test]
    fn test_unknown_mnemonic() {
        assert!(matches!(
            assemble("NOP\n"),
            Err(AssemblerError::UnknownMnemonic { .. })
        ));
    }

    #[test]
    fn test_operand_count_mismatch() {
        assert!(matches!(
            assemble("LDI R0\n"),
            Err(AssemblerError::SyntaxError { .. })
        ));
    }

    #[test]
    fn test_register_out_of_range() {
        assert!(matches!(
            assemble("PRN R8\n"),
            Err(AssemblerError::ValueOutOfRange { line: 1, value: 8 })
        ));
    }

    #[test]
    fn test_undefined_label() {
        assert!(matches!(
            assemble("LDI R0,NOWHERE\n"),
            Err(AssemblerError::UndefinedLabel { .. })
        ));
    }
}
