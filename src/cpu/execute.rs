//! The execution engine: fetch, decode, execute.
//!
//! One [`Cpu::step`] is one instruction cycle. The program counter is
//! advanced past both instruction words before the opcode's effect is
//! applied, so a jump overwrites the increment and everything else
//! keeps it.

use crate::bits::Word;
use crate::cpu::{ProgramStore, DataStore, Registers};
use crate::cpu::decode::{self, Instruction, JumpMode};
use crate::cpu::memory::MemoryError;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// CPU is running normally.
    Running,
    /// CPU has halted (HLT or an unassigned opcode). Only a reset
    /// clears this.
    Halted,
    /// CPU aborted on a fatal condition (program counter ran off the
    /// end of the program store).
    Error,
}

/// A complete CPU instance: registers, both stores, and the halt state.
///
/// Each instance owns its state outright, so independent CPUs can
/// coexist and be tested in isolation.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cpu {
    /// The register file.
    pub regs: Registers,
    /// Read-only program store (ROM).
    pub rom: ProgramStore,
    /// Read/write data store (RAM).
    pub ram: DataStore,
    /// Current execution state.
    pub state: CpuState,
    /// Instruction count (for profiling).
    pub cycles: u64,
    /// Last executed instruction (for debugging).
    last_instr: Option<Instruction>,
    /// Values emitted by OUT, in emission order, awaiting the driver.
    out_buf: Vec<Word>,
}

impl Cpu {
    /// Create a new CPU: registers zeroed, ROM filled with HLT, RAM
    /// zeroed.
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            rom: ProgramStore::new(),
            ram: DataStore::new(),
            state: CpuState::Running,
            cycles: 0,
            last_instr: None,
            out_buf: Vec::new(),
        }
    }

    /// Reset the CPU: zero the registers, clear the halt state, refill
    /// the ROM with HLT and zero the RAM.
    ///
    /// The original design leaves RAM as garbage across reset; zeroing
    /// it is this implementation's documented deviation.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.rom.clear();
        self.ram.clear();
        self.state = CpuState::Running;
        self.cycles = 0;
        self.last_instr = None;
        self.out_buf.clear();
    }

    /// Load a program image at address 0.
    pub fn load_program(&mut self, program: &[Word]) -> Result<(), MemoryError> {
        self.rom.load(0, program)
    }

    /// Execute a single fetch-decode-execute cycle.
    ///
    /// Returns the instruction that was executed. The cycle either
    /// fully applies the opcode's effect or fully applies the HLT
    /// policy; there is no intermediate state.
    pub fn step(&mut self) -> Result<Instruction, CpuError> {
        if self.state != CpuState::Running {
            return Err(CpuError::NotRunning(self.state));
        }

        // Fetch: two words, always both
        let pc = self.regs.pc();
        if pc == Word::MAX {
            // Cannot fetch the operand word without wrapping
            self.state = CpuState::Error;
            return Err(CpuError::PcOutOfRange(pc));
        }
        let word = self.rom.read(pc);
        let operand = self.rom.read(pc + 1);

        // Advance before execute so jumps can override
        self.regs.advance_pc();

        // Decode is total: unassigned opcodes become Unknown
        let instr = decode::decode(word, operand);

        // Execute
        self.execute(instr);

        self.cycles += 1;
        self.last_instr = Some(instr);

        Ok(instr)
    }

    /// Run until halt or error. Returns the number of instructions
    /// executed. No pacing; see [`crate::cpu::Runner`] for paced runs.
    pub fn run(&mut self) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;

        while self.state == CpuState::Running {
            self.step()?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Run for at most `max_cycles` instructions.
    pub fn run_limited(&mut self, max_cycles: u64) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;
        let limit = self.cycles + max_cycles;

        while self.state == CpuState::Running && self.cycles < limit {
            self.step()?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Apply a decoded instruction's effect.
    fn execute(&mut self, instr: Instruction) {
        match instr {
            Instruction::Add { a, b, dst } => {
                let result = self.regs.get(a).wrapping_add(self.regs.get(b));
                self.regs.set(dst, result);
            }

            Instruction::Sub { a, b, dst } => {
                let result = self.regs.get(a).wrapping_sub(self.regs.get(b));
                self.regs.set(dst, result);
            }

            Instruction::Not { reg } => {
                let value = self.regs.get(reg);
                self.regs.set(reg, !value);
            }

            Instruction::And { a, b } => {
                let result = self.regs.get(a) & self.regs.get(b);
                self.regs.set_truth(result != 0);
            }

            Instruction::Or { a, b } => {
                let result = self.regs.get(a) | self.regs.get(b);
                self.regs.set_truth(result != 0);
            }

            Instruction::Cmp { a, b } => {
                let ordering = self.regs.get(a).cmp(&self.regs.get(b));
                self.regs.set_comparison(ordering);
            }

            Instruction::Cpy { src, dst } => {
                let value = self.regs.get(src);
                self.regs.set(dst, value);
            }

            Instruction::Out { src } => {
                self.out_buf.push(self.regs.get(src));
            }

            Instruction::Mov { src, addr } => {
                self.ram.write(addr, self.regs.get(src));
            }

            Instruction::Ld { dst, addr } => {
                let value = self.ram.read(addr);
                self.regs.set(dst, value);
            }

            Instruction::Ldv { dst, value } => {
                self.regs.set(dst, value);
            }

            Instruction::Jump { mode, flag, addr } => {
                let taken = match mode {
                    JumpMode::IfClear => !self.regs.flag(flag & 0xF),
                    JumpMode::IfSet => self.regs.flag(flag & 0xF),
                    JumpMode::Always => true,
                };
                if taken {
                    self.regs.jump(addr);
                }
            }

            // Unassigned opcodes are HLT by policy, not an error
            Instruction::Hlt | Instruction::Unknown { .. } => {
                self.state = CpuState::Halted;
            }
        }
    }

    /// Drain the values emitted by OUT since the last drain, in
    /// emission order. The cycle driver forwards these to the output
    /// collaborator.
    pub fn take_output(&mut self) -> Vec<Word> {
        std::mem::take(&mut self.out_buf)
    }

    /// Values emitted by OUT and not yet drained.
    pub fn pending_output(&self) -> &[Word] {
        &self.out_buf
    }

    /// Get the last executed instruction.
    pub fn last_instruction(&self) -> Option<Instruction> {
        self.last_instr
    }

    /// Check if the CPU is halted.
    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    /// Check if the CPU is running.
    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .finish()
    }
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Clone, Error)]
pub enum CpuError {
    #[error("CPU not running: {0:?}")]
    NotRunning(CpuState),

    #[error("program counter 0x{0:04X} cannot fetch a two-word instruction")]
    PcOutOfRange(Word),

    #[error("memory error: {0}")]
    MemoryError(#[from] MemoryError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::decode::encode;
    use crate::cpu::registers::{FLAG_GREATER, FLAG_EQUAL, FLAG_LESS};

    fn make_program(instructions: &[Instruction]) -> Vec<Word> {
        instructions.iter().flat_map(encode).collect()
    }

    fn run_program(instructions: &[Instruction]) -> Cpu {
        let mut cpu = Cpu::new();
        cpu.load_program(&make_program(instructions)).unwrap();
        cpu.run().unwrap();
        cpu
    }

    #[test]
    fn test_unprogrammed_cpu_halts_immediately() {
        let mut cpu = Cpu::new();
        let executed = cpu.run().unwrap();

        assert_eq!(executed, 1);
        assert!(cpu.is_halted());
    }

    #[test]
    fn test_pc_advances_by_two() {
        let mut cpu = Cpu::new();
        cpu.load_program(&make_program(&[
            Instruction::Ldv { dst: 2, value: 1 },
            Instruction::Hlt,
        ]))
        .unwrap();

        cpu.step().unwrap();
        assert_eq!(cpu.regs.pc(), 2);
        cpu.step().unwrap();
        assert_eq!(cpu.regs.pc(), 4);
    }

    #[test]
    fn test_add_and_wraparound() {
        let cpu = run_program(&[
            Instruction::Ldv { dst: 2, value: 0xFFFF },
            Instruction::Ldv { dst: 3, value: 3 },
            Instruction::Add { a: 2, b: 3, dst: 4 },
            Instruction::Hlt,
        ]);

        assert_eq!(cpu.regs.get(4), 2);
    }

    #[test]
    fn test_sub_and_underflow() {
        let cpu = run_program(&[
            Instruction::Ldv { dst: 2, value: 1 },
            Instruction::Ldv { dst: 3, value: 2 },
            Instruction::Sub { a: 2, b: 3, dst: 4 },
            Instruction::Hlt,
        ]);

        assert_eq!(cpu.regs.get(4), 0xFFFF);
    }

    #[test]
    fn test_not_in_place() {
        let cpu = run_program(&[
            Instruction::Ldv { dst: 2, value: 0x00FF },
            Instruction::Not { reg: 2 },
            Instruction::Hlt,
        ]);

        assert_eq!(cpu.regs.get(2), 0xFF00);
    }

    #[test]
    fn test_and_or_truth_flags() {
        // AND of disjoint masks is zero, OR is not
        let cpu = run_program(&[
            Instruction::Ldv { dst: 2, value: 0x0F00 },
            Instruction::Ldv { dst: 3, value: 0x00F0 },
            Instruction::And { a: 2, b: 3 },
            Instruction::Hlt,
        ]);
        assert!(!cpu.regs.flag(FLAG_EQUAL));

        let cpu = run_program(&[
            Instruction::Ldv { dst: 2, value: 0x0F00 },
            Instruction::Ldv { dst: 3, value: 0x00F0 },
            Instruction::Or { a: 2, b: 3 },
            Instruction::Hlt,
        ]);
        assert!(cpu.regs.flag(FLAG_EQUAL));
        assert!(!cpu.regs.flag(FLAG_GREATER));
        assert!(!cpu.regs.flag(FLAG_LESS));
    }

    #[test]
    fn test_and_or_do_not_write_registers() {
        let cpu = run_program(&[
            Instruction::Ldv { dst: 2, value: 0xFF00 },
            Instruction::Ldv { dst: 3, value: 0x0FF0 },
            Instruction::And { a: 2, b: 3 },
            Instruction::Hlt,
        ]);

        assert_eq!(cpu.regs.get(2), 0xFF00);
        assert_eq!(cpu.regs.get(3), 0x0FF0);
    }

    #[test]
    fn test_cmp_orderings() {
        let cpu = run_program(&[
            Instruction::Ldv { dst: 2, value: 5 },
            Instruction::Ldv { dst: 3, value: 3 },
            Instruction::Cmp { a: 2, b: 3 },
            Instruction::Hlt,
        ]);
        assert!(cpu.regs.flag(FLAG_GREATER));
        assert_eq!(cpu.regs.flags() & 0x7, 1 << FLAG_GREATER);

        let cpu = run_program(&[
            Instruction::Ldv { dst: 2, value: 3 },
            Instruction::Ldv { dst: 3, value: 5 },
            Instruction::Cmp { a: 2, b: 3 },
            Instruction::Hlt,
        ]);
        assert_eq!(cpu.regs.flags() & 0x7, 1 << FLAG_LESS);

        let cpu = run_program(&[
            Instruction::Ldv { dst: 2, value: 7 },
            Instruction::Cpy { src: 2, dst: 3 },
            Instruction::Cmp { a: 2, b: 3 },
            Instruction::Hlt,
        ]);
        assert_eq!(cpu.regs.flags() & 0x7, 1 << FLAG_EQUAL);
    }

    #[test]
    fn test_cmp_is_unsigned() {
        // 0x8000 would be negative as a signed word; unsigned it is large
        let cpu = run_program(&[
            Instruction::Ldv { dst: 2, value: 0x8000 },
            Instruction::Ldv { dst: 3, value: 1 },
            Instruction::Cmp { a: 2, b: 3 },
            Instruction::Hlt,
        ]);
        assert!(cpu.regs.flag(FLAG_GREATER));
    }

    #[test]
    fn test_out_emission_order() {
        let mut cpu = Cpu::new();
        cpu.load_program(&make_program(&[
            Instruction::Ldv { dst: 2, value: 11 },
            Instruction::Out { src: 2 },
            Instruction::Ldv { dst: 2, value: 22 },
            Instruction::Out { src: 2 },
            Instruction::Hlt,
        ]))
        .unwrap();

        cpu.run().unwrap();
        assert_eq!(cpu.take_output(), vec![11, 22]);
        assert!(cpu.take_output().is_empty());
    }

    #[test]
    fn test_mov_ld_roundtrip_through_ram() {
        let cpu = run_program(&[
            Instruction::Ldv { dst: 2, value: 0xBEEF },
            Instruction::Mov { src: 2, addr: 0x0100 },
            Instruction::Ld { dst: 3, addr: 0x0100 },
            Instruction::Cmp { a: 2, b: 3 },
            Instruction::Hlt,
        ]);

        assert_eq!(cpu.regs.get(3), 0xBEEF);
        assert_eq!(cpu.ram.read(0x0100), 0xBEEF);
        assert!(cpu.regs.flag(FLAG_EQUAL));
    }

    #[test]
    fn test_unconditional_jump() {
        let mut cpu = Cpu::new();
        cpu.load_program(&make_program(&[
            Instruction::Jump { mode: JumpMode::Always, flag: 0, addr: 4 },
            Instruction::Ldv { dst: 2, value: 99 }, // skipped
            Instruction::Hlt,
        ]))
        .unwrap();

        let executed = cpu.run().unwrap();
        assert_eq!(executed, 2);
        assert_eq!(cpu.regs.get(2), 0);
    }

    #[test]
    fn test_conditional_jump_on_clear_flag() {
        // Flags start zeroed, so a mode-0 jump on the greater bit is taken
        let mut cpu = Cpu::new();
        cpu.load_program(&make_program(&[
            Instruction::Jump { mode: JumpMode::IfClear, flag: FLAG_GREATER, addr: 4 },
            Instruction::Ldv { dst: 2, value: 99 }, // skipped
            Instruction::Hlt,
        ]))
        .unwrap();

        cpu.run().unwrap();
        assert_eq!(cpu.regs.get(2), 0);
    }

    #[test]
    fn test_conditional_jump_not_taken_falls_through() {
        let mut cpu = Cpu::new();
        cpu.load_program(&make_program(&[
            Instruction::Jump { mode: JumpMode::IfSet, flag: FLAG_GREATER, addr: 8 },
            Instruction::Ldv { dst: 2, value: 99 },
            Instruction::Hlt,
        ]))
        .unwrap();

        cpu.run().unwrap();
        assert_eq!(cpu.regs.get(2), 99);
    }

    #[test]
    fn test_unknown_opcode_halts_permanently() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[0xB000, 0x0000]).unwrap();

        let instr = cpu.step().unwrap();
        assert_eq!(instr, Instruction::Unknown { opcode: 0xB });
        assert!(cpu.is_halted());

        // Halt is sticky until reset
        assert!(matches!(cpu.step(), Err(CpuError::NotRunning(CpuState::Halted))));
        cpu.reset();
        assert!(cpu.is_running());
    }

    #[test]
    fn test_pc_out_of_range_is_surfaced() {
        let mut cpu = Cpu::new();
        cpu.load_program(&make_program(&[Instruction::Jump {
            mode: JumpMode::Always,
            flag: 0,
            addr: 0xFFFF,
        }]))
        .unwrap();

        cpu.step().unwrap();
        assert!(matches!(cpu.step(), Err(CpuError::PcOutOfRange(0xFFFF))));
        assert_eq!(cpu.state, CpuState::Error);
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut cpu = Cpu::new();
        cpu.load_program(&make_program(&[
            Instruction::Ldv { dst: 2, value: 1 },
            Instruction::Mov { src: 2, addr: 0 },
            Instruction::Out { src: 2 },
            Instruction::Hlt,
        ]))
        .unwrap();
        cpu.run().unwrap();

        cpu.reset();
        assert!(cpu.is_running());
        assert_eq!(cpu.cycles, 0);
        assert_eq!(cpu.regs.get(2), 0);
        assert_eq!(cpu.ram.read(0), 0);
        assert_eq!(cpu.rom.read(0), crate::cpu::HLT_WORD);
        assert!(cpu.pending_output().is_empty());
        assert!(cpu.last_instruction().is_none());
    }

    /// The Fibonacci listing from the original machine-code example.
    const FIBONACCI: [Word; 18] = [
        0xA200, 0x0000, // LDV r2, 0
        0xA300, 0x0001, // LDV r3, 1
        0x0234, 0x0000, // ADD r2 r3 -> r4
        0x7400, 0x0000, // OUT r4
        0x6320, 0x0000, // CPY r3 -> r2
        0x6430, 0x0000, // CPY r4 -> r3
        0x0234, 0x0000, // ADD r2 r3 -> r4
        0x5430, 0x0000, // CMP r4 r3
        0xE100, 0x0006, // J if greater -> 0x0006
    ];

    #[test]
    fn test_fibonacci_end_to_end() {
        let mut cpu = Cpu::new();
        cpu.load_program(&FIBONACCI).unwrap();
        cpu.run().unwrap();

        // Runs off the end of the loop into the HLT-filled store once
        // the 16-bit addition wraps and CMP no longer reports greater
        assert!(cpu.is_halted());

        let output = cpu.take_output();
        assert_eq!(&output[..6], &[1, 2, 3, 5, 8, 13]);
        assert!(output.windows(2).all(|w| w[0] < w[1]), "output must be strictly increasing");
        assert_eq!(*output.last().unwrap(), 46368); // largest Fibonacci number in 16 bits
    }

    #[test]
    fn test_independent_cpu_instances() {
        let mut a = Cpu::new();
        let mut b = Cpu::new();
        a.load_program(&make_program(&[
            Instruction::Ldv { dst: 2, value: 1 },
            Instruction::Hlt,
        ]))
        .unwrap();
        b.load_program(&make_program(&[
            Instruction::Ldv { dst: 2, value: 2 },
            Instruction::Hlt,
        ]))
        .unwrap();

        a.run().unwrap();
        b.run().unwrap();

        assert_eq!(a.regs.get(2), 1);
        assert_eq!(b.regs.get(2), 2);
    }
}
