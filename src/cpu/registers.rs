//! The register file.
//!
//! Sixteen 16-bit registers, all addressable by a single operand nibble:
//! - r0: program counter (word address of the next instruction)
//! - r1: flags (bit 0 = greater, bit 1 = equal, bit 2 = less)
//! - r2-r15: general purpose
//!
//! All registers are zero at reset. Only the low three bits of the flags
//! register are defined; the rest are reserved.

use crate::bits::{Word, get_bit, set_bit};
use serde::{Serialize, Deserialize};
use std::cmp::Ordering;

/// Number of registers (the most a 4-bit operand field can address).
pub const NUM_REGISTERS: usize = 16;

/// Register index of the program counter.
pub const REG_PC: u8 = 0;

/// Register index of the flags register.
pub const REG_FLAGS: u8 = 1;

/// Flag bit position: last comparison was greater-than.
pub const FLAG_GREATER: u8 = 0;

/// Flag bit position: last comparison was equal.
pub const FLAG_EQUAL: u8 = 1;

/// Flag bit position: last comparison was less-than.
pub const FLAG_LESS: u8 = 2;

/// The register file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    regs: [Word; NUM_REGISTERS],
}

impl Registers {
    /// Create a register file with all registers zeroed.
    pub fn new() -> Self {
        Self {
            regs: [0; NUM_REGISTERS],
        }
    }

    /// Reset all registers to zero.
    pub fn reset(&mut self) {
        self.regs = [0; NUM_REGISTERS];
    }

    /// Read a register by its operand-nibble index (0-15).
    #[inline]
    pub fn get(&self, index: u8) -> Word {
        self.regs[index as usize]
    }

    /// Write a register by its operand-nibble index (0-15).
    #[inline]
    pub fn set(&mut self, index: u8, value: Word) {
        self.regs[index as usize] = value;
    }

    /// The program counter (r0).
    #[inline]
    pub fn pc(&self) -> Word {
        self.regs[REG_PC as usize]
    }

    /// The flags register (r1).
    #[inline]
    pub fn flags(&self) -> Word {
        self.regs[REG_FLAGS as usize]
    }

    /// Advance the program counter past the two-word instruction just
    /// fetched. Returns the old value. Wraps at the top of the address
    /// space like any other 16-bit register.
    pub fn advance_pc(&mut self) -> Word {
        let old = self.pc();
        self.regs[REG_PC as usize] = old.wrapping_add(2);
        old
    }

    /// Set the program counter to an absolute address.
    pub fn jump(&mut self, addr: Word) {
        self.regs[REG_PC as usize] = addr;
    }

    /// Read a single bit of the flags register.
    pub fn flag(&self, bit: u8) -> bool {
        get_bit(self.flags(), bit)
    }

    /// Record a comparison outcome: clears all three condition bits,
    /// then sets exactly the one matching the ordering.
    pub fn set_comparison(&mut self, ordering: Ordering) {
        let flags = &mut self.regs[REG_FLAGS as usize];
        set_bit(flags, FLAG_GREATER, ordering == Ordering::Greater);
        set_bit(flags, FLAG_EQUAL, ordering == Ordering::Equal);
        set_bit(flags, FLAG_LESS, ordering == Ordering::Less);
    }

    /// Record a truth outcome (used by AND/OR): clears all three
    /// condition bits, then sets the equal bit iff `truthy`.
    pub fn set_truth(&mut self, truthy: bool) {
        let flags = &mut self.regs[REG_FLAGS as usize];
        set_bit(flags, FLAG_GREATER, false);
        set_bit(flags, FLAG_EQUAL, truthy);
        set_bit(flags, FLAG_LESS, false);
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}
