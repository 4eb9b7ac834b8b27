//! CPU emulation for the hypothetical 16-bit machine.
//!
//! This module implements the complete architecture:
//! - 65536-word program store (ROM) and 65536-word data store (RAM)
//! - 16 registers of 16 bits: r0 (program counter), r1 (flags), r2-r15
//! - two-word instructions with a 4-bit opcode and three 4-bit operand fields
//! - a cycle driver with injectable pacing

pub mod memory;
pub mod registers;
pub mod decode;
pub mod execute;
pub mod runner;

pub use memory::{ProgramStore, DataStore, MemoryError, MEMORY_SIZE, HLT_WORD};
pub use registers::{Registers, NUM_REGISTERS, FLAG_GREATER, FLAG_EQUAL, FLAG_LESS};
pub use decode::{Instruction, JumpMode, decode, encode};
pub use execute::{Cpu, CpuError, CpuState};
pub use runner::{Runner, Pacing};
