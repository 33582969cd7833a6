//! Disassembler for LS-8 programs.
//!
//! Walks a byte stream using the operand counts encoded in each opcode.
//! Code and data are indistinguishable at rest, so bytes that decode to
//! nothing (and operand bytes cut off by the end of the program) render
//! as `DS8` data directives.

use crate::cpu::decode::{decode, Opcode};

/// Disassemble a program to readable assembly text.
pub fn disassemble(bytes: &[u8]) -> String {
    let mut output = String::new();
    output.push_str("; LS-8 disassembly\n");
    output.push_str("; ----------------\n\n");

    let mut addr = 0;
    while addr < bytes.len() {
        let (line, consumed) = disassemble_instruction(&bytes[addr..]);
        output.push_str(&format!("{:03}: {}\n", addr, line));
        addr += consumed;
    }

    output
}

/// Disassemble the instruction at the start of `bytes`.
///
/// Returns the text and the number of bytes consumed (always at least 1).
pub fn disassemble_instruction(bytes: &[u8]) -> (String, usize) {
    let raw = match bytes.first() {
        Some(&raw) => raw,
        None => return (String::new(), 0),
    };

    let opcode = match decode(raw) {
        Ok(opcode) => opcode,
        Err(_) => return (format!("DS8 0b{:08b}", raw), 1),
    };

    let count = opcode.operand_count();
    if bytes.len() <= count {
        // Truncated instruction: render the opcode byte as data
        return (format!("DS8 0b{:08b}", raw), 1);
    }

    let text = match count {
        0 => opcode.mnemonic().to_string(),
        1 => format!("{} R{}", opcode.mnemonic(), bytes[1]),
        _ => match opcode {
            // LDI's second operand is an immediate
            Opcode::Ldi => format!("LDI R{},{}", bytes[1], bytes[2]),
            _ => format!("{} R{},R{}", opcode.mnemonic(), bytes[1], bytes[2]),
        },
    };

    (text, 1 + count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disassemble_print8() {
        let program = [0x82, 0, 8, 0x47, 0, 0x01];

        let output = disassemble(&program);

        assert!(output.contains("000: LDI R0,8"));
        assert!(output.contains("003: PRN R0"));
        assert!(output.contains("005: HLT"));
    }

    #[test]
    fn test_disassemble_two_register_ops() {
        let (line, consumed) = disassemble_instruction(&[0xA2, 0, 1]);

        assert_eq!(line, "MUL R0,R1");
        assert_eq!(consumed, 3);
    }

    #[test]
    fn test_unmapped_byte_renders_as_data() {
        let (line, consumed) = disassemble_instruction(&[0xFF]);

        assert_eq!(line, "DS8 0b11111111");
        assert_eq!(consumed, 1);
    }

    #[test]
    fn test_truncated_instruction_renders_as_data() {
        // LDI wants two operands but the program ends after one
        let (line, consumed) = disassemble_instruction(&[0x82, 0]);

        assert_eq!(line, "DS8 0b10000010");
        assert_eq!(consumed, 1);
    }
}
