//! Simple two-pass assembler.
//!
//! Syntax:
//! ```text
//! ; Comment
//! LOOP:               ; Define a label (word address)
//!     LDV r2, 0       ; Load immediate
//!     ADD r2 r3 r4    ; Registers are rN or bare 0-15
//!     CMP r4, r3
//!     J 1 0, LOOP     ; Jump mode, flag bit, target
//!     JG LOOP         ; Alias for J 1 0
//!     HLT
//!
//!     ORG 0x0040      ; Set origin (pads with the HLT fill)
//!     DAT 42          ; Emit a raw data word
//! ```
//!
//! Every instruction assembles to two words; labels refer to word
//! addresses, which is what the J operand word expects.

use crate::bits::Word;
use crate::cpu::decode::{Instruction, JumpMode, encode};
use crate::cpu::memory::HLT_WORD;
use crate::cpu::registers::{FLAG_GREATER, FLAG_EQUAL, FLAG_LESS};
use std::collections::HashMap;
use thiserror::Error;

/// Assemble source code to a word image starting at address 0.
pub fn assemble(source: &str) -> Result<Vec<Word>, AssemblerError> {
    let mut asm = Assembler::new();
    asm.assemble(source)
}

/// A parsed operand: either a literal value or a label to resolve in
/// pass 2.
enum Operand {
    Value(Word),
    Label(String),
}

/// The assembler state.
struct Assembler {
    /// Symbol table (label -> word address).
    symbols: HashMap<String, Word>,
    /// Unresolved references: (output word index, label, source line).
    pending: Vec<(usize, String, usize)>,
    /// Output words; index equals word address.
    output: Vec<Word>,
}

impl Assembler {
    fn new() -> Self {
        Self {
            symbols: HashMap::new(),
            pending: Vec::new(),
            output: Vec::new(),
        }
    }

    fn assemble(&mut self, source: &str) -> Result<Vec<Word>, AssemblerError> {
        // Pass 1: collect labels and generate code
        for (line_num, line) in source.lines().enumerate() {
            self.process_line(line, line_num + 1)?;
        }

        // Pass 2: resolve forward references
        self.resolve_references()?;

        Ok(std::mem::take(&mut self.output))
    }

    fn process_line(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        // Strip comments and whitespace
        let line = match line.find(';') {
            Some(idx) => &line[..idx],
            None => line,
        };
        let line = line.trim();

        if line.is_empty() {
            return Ok(());
        }

        // Label definition, optionally followed by an instruction
        if let Some(colon_idx) = line.find(':') {
            let label = line[..colon_idx].trim().to_uppercase();
            if !label.is_empty() {
                self.symbols.insert(label, self.output.len() as Word);
            }

            let rest = line[colon_idx + 1..].trim();
            if !rest.is_empty() {
                return self.process_instruction(rest, line_num);
            }
            return Ok(());
        }

        self.process_instruction(line, line_num)
    }

    fn process_instruction(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        let parts: Vec<&str> = line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
            .collect();
        let Some(&first) = parts.first() else {
            return Ok(());
        };
        let mnemonic = first.to_uppercase();
        let args = &parts[1..];

        match mnemonic.as_str() {
            // Directives
            "ORG" => {
                let addr = self.require_value(args, 0, &mnemonic, line_num)?;
                if (addr as usize) < self.output.len() {
                    return Err(AssemblerError::SyntaxError {
                        line: line_num,
                        message: format!("ORG 0x{:04X} is behind the current address", addr),
                    });
                }
                self.output.resize(addr as usize, HLT_WORD);
            }

            "DAT" | "DATA" => {
                let word_idx = self.output.len();
                let value = self.operand_at(args, 0, &mnemonic, line_num, word_idx)?;
                self.output.push(value);
            }

            // Instructions
            _ => {
                let instr = self.parse_instruction(&mnemonic, args, line_num)?;
                let [word, operand] = encode(&instr);
                // The operand word may have been registered as pending;
                // pass 2 overwrites it in place
                self.output.push(word);
                self.output.push(operand);
            }
        }

        Ok(())
    }

    fn parse_instruction(
        &mut self,
        mnemonic: &str,
        args: &[&str],
        line_num: usize,
    ) -> Result<Instruction, AssemblerError> {
        // Word index of this instruction's operand word, for pending
        // label references
        let operand_idx = self.output.len() + 1;

        let reg = |asm: &Self, i: usize| asm.require_register(args, i, mnemonic, line_num);

        let instr = match mnemonic {
            "ADD" => Instruction::Add { a: reg(self, 0)?, b: reg(self, 1)?, dst: reg(self, 2)? },
            "SUB" => Instruction::Sub { a: reg(self, 0)?, b: reg(self, 1)?, dst: reg(self, 2)? },
            "NOT" => Instruction::Not { reg: reg(self, 0)? },
            "AND" => Instruction::And { a: reg(self, 0)?, b: reg(self, 1)? },
            "OR" => Instruction::Or { a: reg(self, 0)?, b: reg(self, 1)? },
            "CMP" => Instruction::Cmp { a: reg(self, 0)?, b: reg(self, 1)? },
            "CPY" => Instruction::Cpy { src: reg(self, 0)?, dst: reg(self, 1)? },
            "OUT" => Instruction::Out { src: reg(self, 0)? },

            "MOV" => {
                let src = reg(self, 0)?;
                let addr = self.operand_at(args, 1, mnemonic, line_num, operand_idx)?;
                Instruction::Mov { src, addr }
            }
            "LD" => {
                let dst = reg(self, 0)?;
                let addr = self.operand_at(args, 1, mnemonic, line_num, operand_idx)?;
                Instruction::Ld { dst, addr }
            }
            "LDV" => {
                let dst = reg(self, 0)?;
                let value = self.operand_at(args, 1, mnemonic, line_num, operand_idx)?;
                Instruction::Ldv { dst, value }
            }

            "J" => {
                let mode = self.require_value(args, 0, mnemonic, line_num)?;
                let flag = self.require_flag(args, 1, mnemonic, line_num)?;
                let addr = self.operand_at(args, 2, mnemonic, line_num, operand_idx)?;
                Instruction::Jump { mode: JumpMode::from_nibble(mode as u8), flag, addr }
            }
            // Condition aliases
            "JMP" => {
                let addr = self.operand_at(args, 0, mnemonic, line_num, operand_idx)?;
                Instruction::Jump { mode: JumpMode::Always, flag: 0, addr }
            }
            "JG" | "JE" | "JL" => {
                let flag = match mnemonic {
                    "JG" => FLAG_GREATER,
                    "JE" => FLAG_EQUAL,
                    _ => FLAG_LESS,
                };
                let addr = self.operand_at(args, 0, mnemonic, line_num, operand_idx)?;
                Instruction::Jump { mode: JumpMode::IfSet, flag, addr }
            }

            "HLT" | "HALT" => Instruction::Hlt,

            _ => {
                return Err(AssemblerError::UnknownMnemonic {
                    line: line_num,
                    mnemonic: mnemonic.to_string(),
                })
            }
        };

        Ok(instr)
    }

    /// Parse an operand that lands in an output word, registering a
    /// pending reference if it is a label.
    fn operand_at(
        &mut self,
        args: &[&str],
        index: usize,
        mnemonic: &str,
        line_num: usize,
        word_idx: usize,
    ) -> Result<Word, AssemblerError> {
        let token = self.require_arg(args, index, mnemonic, line_num)?;
        match parse_operand(token, line_num)? {
            Operand::Value(v) => Ok(v),
            Operand::Label(label) => {
                self.pending.push((word_idx, label, line_num));
                Ok(0) // placeholder, resolved in pass 2
            }
        }
    }

    /// Parse an operand that must be a literal value (no labels).
    fn require_value(
        &self,
        args: &[&str],
        index: usize,
        mnemonic: &str,
        line_num: usize,
    ) -> Result<Word, AssemblerError> {
        let token = self.require_arg(args, index, mnemonic, line_num)?;
        match parse_operand(token, line_num)? {
            Operand::Value(v) => Ok(v),
            Operand::Label(label) => Err(AssemblerError::SyntaxError {
                line: line_num,
                message: format!("{} does not take a label operand: {}", mnemonic, label),
            }),
        }
    }

    fn require_register(
        &self,
        args: &[&str],
        index: usize,
        mnemonic: &str,
        line_num: usize,
    ) -> Result<u8, AssemblerError> {
        let token = self.require_arg(args, index, mnemonic, line_num)?;
        let digits = token.strip_prefix(|c| c == 'r' || c == 'R').unwrap_or(token);
        match digits.parse::<u8>() {
            Ok(n) if n < 16 => Ok(n),
            _ => Err(AssemblerError::BadRegister {
                line: line_num,
                token: token.to_string(),
            }),
        }
    }

    /// Flag operand of J: a bit position, or a condition name.
    fn require_flag(
        &self,
        args: &[&str],
        index: usize,
        mnemonic: &str,
        line_num: usize,
    ) -> Result<u8, AssemblerError> {
        let token = self.require_arg(args, index, mnemonic, line_num)?;
        match token.to_uppercase().as_str() {
            "GT" => Ok(FLAG_GREATER),
            "EQ" => Ok(FLAG_EQUAL),
            "LT" => Ok(FLAG_LESS),
            _ => match token.parse::<u8>() {
                Ok(n) if n < 16 => Ok(n),
                _ => Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: format!("bad flag operand: {}", token),
                }),
            },
        }
    }

    fn require_arg<'a>(
        &self,
        args: &[&'a str],
        index: usize,
        mnemonic: &str,
        line_num: usize,
    ) -> Result<&'a str, AssemblerError> {
        args.get(index).copied().ok_or_else(|| AssemblerError::SyntaxError {
            line: line_num,
            message: format!("{} is missing operand {}", mnemonic, index + 1),
        })
    }

    fn resolve_references(&mut self) -> Result<(), AssemblerError> {
        for (word_idx, label, line_num) in &self.pending {
            let addr = self.symbols.get(label).ok_or_else(|| AssemblerError::UndefinedLabel {
                line: *line_num,
                label: label.clone(),
            })?;
            self.output[*word_idx] = *addr;
        }
        Ok(())
    }
}

/// Parse a value token: decimal (negatives encode as two's complement),
/// `0x` hex, or a label reference.
fn parse_operand(token: &str, line_num: usize) -> Result<Operand, AssemblerError> {
    if let Some(hex) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        return match u32::from_str_radix(hex, 16) {
            Ok(v) if v <= 0xFFFF => Ok(Operand::Value(v as Word)),
            Ok(v) => Err(AssemblerError::ValueOutOfRange { line: line_num, value: v as i64 }),
            Err(_) => Err(AssemblerError::SyntaxError {
                line: line_num,
                message: format!("invalid hex literal: {}", token),
            }),
        };
    }

    if token.starts_with('-') || token.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return match token.parse::<i64>() {
            Ok(v) if (-0x8000..=0xFFFF).contains(&v) => Ok(Operand::Value(v as Word)),
            Ok(v) => Err(AssemblerError::ValueOutOfRange { line: line_num, value: v }),
            Err(_) => Err(AssemblerError::SyntaxError {
                line: line_num,
                message: format!("invalid number: {}", token),
            }),
        };
    }

    Ok(Operand::Label(token.to_uppercase()))
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

    #[error("bad register on line {line}: {token}")]
    BadRegister { line: usize, token: String },
}
