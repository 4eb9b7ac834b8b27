//! Instruction decoder.
//!
//! Every instruction is two consecutive words. The first packs the
//! opcode and up to three operand fields, one nibble each:
//!
//! ```text
//! opcode aaaa bbbb cccc
//! ```
//!
//! The second word is a 16-bit immediate or address, read on every
//! fetch and ignored by the opcodes that do not need one.

use crate::bits::{Word, nibble};
use serde::{Serialize, Deserialize};

/// Condition mode of the J instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JumpMode {
    /// Jump iff the named flag bit is 0 (mode nibble 0).
    IfClear,
    /// Jump iff the named flag bit is 1 (mode nibble 1).
    IfSet,
    /// Jump unconditionally (mode nibble 2, and any other value).
    Always,
}

impl JumpMode {
    /// Decode the mode nibble. Values other than 0 and 1 all mean an
    /// unconditional jump.
    pub fn from_nibble(n: u8) -> Self {
        match n {
            0 => JumpMode::IfClear,
            1 => JumpMode::IfSet,
            _ => JumpMode::Always,
        }
    }

    /// The canonical nibble for this mode.
    pub fn to_nibble(self) -> u8 {
        match self {
            JumpMode::IfClear => 0,
            JumpMode::IfSet => 1,
            JumpMode::Always => 2,
        }
    }
}

/// A decoded instruction.
///
/// The opcode set is closed: every nibble value not assigned below
/// decodes to [`Instruction::Unknown`], which the engine treats as HLT.
/// Register fields are operand-nibble indices (0-15).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    /// r\[dst\] := r\[a\] + r\[b\], wrapping at 16 bits.
    Add { a: u8, b: u8, dst: u8 },

    /// r\[dst\] := r\[a\] - r\[b\], wrapping at 16 bits.
    Sub { a: u8, b: u8, dst: u8 },

    /// r\[reg\] := bitwise complement of r\[reg\].
    Not { reg: u8 },

    /// Set flags from the truthiness of r\[a\] & r\[b\].
    And { a: u8, b: u8 },

    /// Set flags from the truthiness of r\[a\] | r\[b\].
    Or { a: u8, b: u8 },

    /// Compare r\[a\] with r\[b\] (unsigned) and set exactly one of the
    /// greater/equal/less flag bits.
    Cmp { a: u8, b: u8 },

    /// r\[dst\] := r\[src\].
    Cpy { src: u8, dst: u8 },

    /// Emit r\[src\] to the output collaborator.
    Out { src: u8 },

    /// RAM\[addr\] := r\[src\].
    Mov { src: u8, addr: Word },

    /// r\[dst\] := RAM\[addr\].
    Ld { dst: u8, addr: Word },

    /// r\[dst\] := value (an immediate from the program store, not a
    /// memory read).
    Ldv { dst: u8, value: Word },

    /// pc := addr if the condition holds, overriding the increment.
    Jump { mode: JumpMode, flag: u8, addr: Word },

    /// Halt until reset.
    Hlt,

    /// An unassigned opcode nibble; executes as HLT.
    Unknown { opcode: u8 },
}

/// Opcode nibble assignments.
mod op {
    use crate::bits::Word;

    pub const ADD: Word = 0x0;
    pub const SUB: Word = 0x1;
    pub const NOT: Word = 0x2;
    pub const AND: Word = 0x3;
    pub const OR: Word = 0x4;
    pub const CMP: Word = 0x5;
    pub const CPY: Word = 0x6;
    pub const OUT: Word = 0x7;
    pub const MOV: Word = 0x8;
    pub const LD: Word = 0x9;
    pub const LDV: Word = 0xA;
    // 0xB-0xD unassigned
    pub const J: Word = 0xE;
    pub const HLT: Word = 0xF;
}

/// Decode a two-word instruction.
///
/// Total: every input maps to some instruction; unassigned opcode
/// nibbles map to [`Instruction::Unknown`].
pub fn decode(word: Word, operand: Word) -> Instruction {
    let opcode = nibble(word, 1);
    let a = nibble(word, 2) as u8;
    let b = nibble(word, 3) as u8;
    let c = nibble(word, 4) as u8;

    match opcode {
        op::ADD => Instruction::Add { a, b, dst: c },
        op::SUB => Instruction::Sub { a, b, dst: c },
        op::NOT => Instruction::Not { reg: a },
        op::AND => Instruction::And { a, b },
        op::OR => Instruction::Or { a, b },
        op::CMP => Instruction::Cmp { a, b },
        op::CPY => Instruction::Cpy { src: a, dst: b },
        op::OUT => Instruction::Out { src: a },
        op::MOV => Instruction::Mov { src: a, addr: operand },
        op::LD => Instruction::Ld { dst: a, addr: operand },
        op::LDV => Instruction::Ldv { dst: a, value: operand },
        op::J => Instruction::Jump {
            mode: JumpMode::from_nibble(a),
            flag: b,
            addr: operand,
        },
        op::HLT => Instruction::Hlt,
        _ => Instruction::Unknown { opcode: opcode as u8 },
    }
}

/// Encode an instruction to its two-word form.
///
/// Don't-care fields encode as zero, so `decode(encode(i))` returns an
/// instruction with the same effect.
pub fn encode(instr: &Instruction) -> [Word; 2] {
    let pack = |opcode: Word, a: u8, b: u8, c: u8| -> Word {
        (opcode << 12) | ((a as Word) << 8) | ((b as Word) << 4) | c as Word
    };

    match *instr {
        Instruction::Add { a, b, dst } => [pack(op::ADD, a, b, dst), 0],
        Instruction::Sub { a, b, dst } => [pack(op::SUB, a, b, dst), 0],
        Instruction::Not { reg } => [pack(op::NOT, reg, 0, 0), 0],
        Instruction::And { a, b } => [pack(op::AND, a, b, 0), 0],
        Instruction::Or { a, b } => [pack(op::OR, a, b, 0), 0],
        Instruction::Cmp { a, b } => [pack(op::CMP, a, b, 0), 0],
        Instruction::Cpy { src, dst } => [pack(op::CPY, src, dst, 0), 0],
        Instruction::Out { src } => [pack(op::OUT, src, 0, 0), 0],
        Instruction::Mov { src, addr } => [pack(op::MOV, src, 0, 0), addr],
        Instruction::Ld { dst, addr } => [pack(op::LD, dst, 0, 0), addr],
        Instruction::Ldv { dst, value } => [pack(op::LDV, dst, 0, 0), value],
        Instruction::Jump { mode, flag, addr } => {
            [pack(op::J, mode.to_nibble(), flag, 0), addr]
        }
        Instruction::Hlt => [pack(op::HLT, 0, 0, 0), 0],
        Instruction::Unknown { opcode } => [pack(opcode as Word & 0xF, 0, 0, 0), 0],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_add_example() {
        // ADD r2 r3 -> r4, the wire-format example
        let instr = decode(0x0234, 0x0000);
        assert_eq!(instr, Instruction::Add { a: 2, b: 3, dst: 4 });
    }

    #[test]
    fn test_decode_ldv_example() {
        // LDV r3, 0x0001; low nibbles are don't-care
        let instr = decode(0xA3FF, 0x0001);
        assert_eq!(instr, Instruction::Ldv { dst: 3, value: 0x0001 });
    }

    #[test]
    fn test_decode_hlt_ignores_operand_fields() {
        assert_eq!(decode(0xF000, 0x0000), Instruction::Hlt);
        assert_eq!(decode(0xFFFF, 0xABCD), Instruction::Hlt);
    }

    #[test]
    fn test_decode_jump_modes() {
        let j = decode(0xE120, 0x0000);
        assert_eq!(j, Instruction::Jump { mode: JumpMode::IfSet, flag: 2, addr: 0 });

        let j = decode(0xE010, 0x0040);
        assert_eq!(j, Instruction::Jump { mode: JumpMode::IfClear, flag: 1, addr: 0x40 });

        // Any mode nibble past 1 is unconditional
        for mode_nibble in 2..=0xF {
            let word = 0xE000 | (mode_nibble << 8);
            match decode(word, 0) {
                Instruction::Jump { mode: JumpMode::Always, .. } => {}
                other => panic!("mode nibble {:x} decoded to {:?}", mode_nibble, other),
            }
        }
    }

    #[test]
    fn test_unassigned_opcodes_decode_to_unknown() {
        for opcode in [0xB, 0xC, 0xD] {
            let word = (opcode as Word) << 12;
            assert_eq!(decode(word, 0), Instruction::Unknown { opcode });
        }
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let cases = [
            Instruction::Add { a: 2, b: 3, dst: 4 },
            Instruction::Sub { a: 15, b: 0, dst: 7 },
            Instruction::Not { reg: 5 },
            Instruction::And { a: 2, b: 3 },
            Instruction::Or { a: 4, b: 5 },
            Instruction::Cmp { a: 4, b: 3 },
            Instruction::Cpy { src: 3, dst: 2 },
            Instruction::Out { src: 4 },
            Instruction::Mov { src: 4, addr: 0x1234 },
            Instruction::Ld { dst: 9, addr: 0xFFFF },
            Instruction::Ldv { dst: 3, value: 1 },
            Instruction::Jump { mode: JumpMode::IfSet, flag: 0, addr: 6 },
            Instruction::Jump { mode: JumpMode::Always, flag: 0, addr: 0 },
            Instruction::Hlt,
        ];

        for instr in cases {
            let [word, operand] = encode(&instr);
            assert_eq!(decode(word, operand), instr, "roundtrip failed for {:?}", instr);
        }
    }

    #[test]
    fn test_cpy_field_layout() {
        // CPY r3 -> r2 assembles to 0x6320 in the Fibonacci listing
        assert_eq!(decode(0x6320, 0), Instruction::Cpy { src: 3, dst: 2 });
    }
}
