//! # CPU16 Emulator
//!
//! An emulator of a minimal hypothetical 16-bit CPU.
//!
//! The machine is deliberately simple: a 4-bit opcode plus three 4-bit
//! operand nibbles, two 16-bit words per instruction, sixteen registers,
//! a read-only program store and a read/write data store. It exists to
//! make the fetch-decode-execute cycle easy to see, not to replicate any
//! real architecture.

pub mod bits;
pub mod cpu;
pub mod asm;

#[cfg(feature = "tui")]
pub mod tui;

// Re-export commonly used types
pub use bits::Word;
pub use cpu::{Cpu, CpuState, CpuError, ProgramStore, DataStore, Registers, Instruction};
pub use cpu::{Runner, Pacing};
pub use asm::{assemble, disassemble, AssemblerError, RomImage, load_image, save_image};

#[cfg(feature = "tui")]
pub use tui::run_debugger;
