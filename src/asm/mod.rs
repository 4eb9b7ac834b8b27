//! Assembler, disassembler and ROM image format.
//!
//! These are loader-side collaborators of the CPU: they produce and
//! parse the two-word wire format the execution engine consumes, but
//! are not part of the engine itself.

pub mod assembler;
pub mod disasm;
pub mod image;

pub use assembler::{assemble, AssemblerError};
pub use disasm::{disassemble, disassemble_instruction};
pub use image::{RomImage, load_image, save_image, ImageError};
