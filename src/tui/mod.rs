//! TUI debugger for the CPU16 emulator.
//!
//! Provides an interactive terminal-based debugger with:
//! - Register and flags visualization
//! - Data store view
//! - Step/run/breakpoint controls
//! - Disassembly around the program counter
//! - OUT emission log

mod app;
mod ui;

pub use app::{DebuggerApp, run_debugger};
