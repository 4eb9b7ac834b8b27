//! Disassembler.
//!
//! Converts two-word machine code back to readable assembly. Output is
//! the canonical numeric syntax the assembler accepts.

use crate::bits::Word;
use crate::cpu::decode::{decode, Instruction};

/// Disassemble a single two-word instruction to text.
pub fn disassemble_instruction(word: Word, operand: Word) -> String {
    match decode(word, operand) {
        Instruction::Add { a, b, dst } => format!("ADD r{} r{} r{}", a, b, dst),
        Instruction::Sub { a, b, dst } => format!("SUB r{} r{} r{}", a, b, dst),
        Instruction::Not { reg } => format!("NOT r{}", reg),
        Instruction::And { a, b } => format!("AND r{} r{}", a, b),
        Instruction::Or { a, b } => format!("OR r{} r{}", a, b),
        Instruction::Cmp { a, b } => format!("CMP r{} r{}", a, b),
        Instruction::Cpy { src, dst } => format!("CPY r{} r{}", src, dst),
        Instruction::Out { src } => format!("OUT r{}", src),
        Instruction::Mov { src, addr } => format!("MOV r{}, 0x{:04X}", src, addr),
        Instruction::Ld { dst, addr } => format!("LD r{}, 0x{:04X}", dst, addr),
        Instruction::Ldv { dst, value } => format!("LDV r{}, 0x{:04X}", dst, value),
        Instruction::Jump { mode, flag, addr } => {
            format!("J {} {}, 0x{:04X}", mode.to_nibble(), flag, addr)
        }
        Instruction::Hlt => "HLT".to_string(),
        Instruction::Unknown { .. } => format!("??? ; 0x{:04X}", word),
    }
}

/// Disassemble a word image, two words per instruction.
pub fn disassemble(words: &[Word]) -> String {
    let mut output = String::new();
    output.push_str("; CPU16 disassembly\n");
    output.push_str("; -----------------\n\n");

    for (i, pair) in words.chunks(2).enumerate() {
        let addr = i * 2;
        match *pair {
            [word, operand] => {
                let line = disassemble_instruction(word, operand);
                output.push_str(&format!(
                    "0x{:04X}: {:<20} ; {:04X} {:04X}\n",
                    addr, line, word, operand
                ));
            }
            // Trailing odd word: no operand to pair it with
            [word] => {
                output.push_str(&format!("0x{:04X}: DAT 0x{:04X}\n", addr, word));
            }
            _ => unreachable!(),
        }
    }

    output
}
