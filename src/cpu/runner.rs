//! The cycle driver.
//!
//! Repeatedly steps a [`Cpu`] until it halts, forwarding OUT emissions
//! to a caller-supplied sink. Pacing between cycles is a policy of the
//! driver, not of the engine: tests run at full speed, interactive runs
//! emulate a clock by sleeping between instructions. The loop checks a
//! shared stop flag between cycles so a caller can cancel it promptly.

use crate::bits::Word;
use crate::cpu::execute::{Cpu, CpuError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Inter-instruction pacing policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// No delay between cycles.
    FullSpeed,
    /// Sleep for a fixed duration between cycles (the original machine
    /// ran at 50 ms per instruction).
    Fixed(Duration),
}

impl Pacing {
    fn pause(&self) {
        if let Pacing::Fixed(delay) = self {
            std::thread::sleep(*delay);
        }
    }
}

/// Drives a CPU until halt, error, or cancellation.
pub struct Runner {
    /// The CPU being driven.
    pub cpu: Cpu,
    pacing: Pacing,
    stop: Arc<AtomicBool>,
}

impl Runner {
    /// Create a driver around a CPU with the given pacing policy.
    pub fn new(cpu: Cpu, pacing: Pacing) -> Self {
        Self {
            cpu,
            pacing,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A handle that cancels the run loop when set. The loop observes
    /// it between cycles, never mid-instruction.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Run until the CPU halts, errors, or the stop handle is set.
    ///
    /// Every value emitted by OUT is delivered to `sink`, one call per
    /// value, in emission order. Returns the number of instructions
    /// executed.
    pub fn run<F: FnMut(Word)>(&mut self, sink: F) -> Result<u64, CpuError> {
        self.run_limited(u64::MAX, sink)
    }

    /// Like [`Runner::run`], but executes at most `max_cycles`
    /// instructions.
    pub fn run_limited<F: FnMut(Word)>(
        &mut self,
        max_cycles: u64,
        mut sink: F,
    ) -> Result<u64, CpuError> {
        let start_cycles = self.cpu.cycles;
        let limit = self.cpu.cycles.saturating_add(max_cycles);

        while self.cpu.is_running()
            && self.cpu.cycles < limit
            && !self.stop.load(Ordering::Relaxed)
        {
            self.cpu.step()?;
            for value in self.cpu.take_output() {
                sink(value);
            }
            if self.cpu.is_running() {
                self.pacing.pause();
            }
        }

        Ok(self.cpu.cycles - start_cycles)
    }

    /// Give back the CPU for inspection.
    pub fn into_cpu(self) -> Cpu {
        self.cpu
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::decode::{Instruction, JumpMode, encode};

    fn load(instructions: &[Instruction]) -> Cpu {
        let mut cpu = Cpu::new();
        let words: Vec<Word> = instructions.iter().flat_map(encode).collect();
        cpu.load_program(&words).unwrap();
        cpu
    }

    #[test]
    fn test_runner_delivers_output_in_order() {
        let cpu = load(&[
            Instruction::Ldv { dst: 2, value: 7 },
            Instruction::Out { src: 2 },
            Instruction::Ldv { dst: 2, value: 9 },
            Instruction::Out { src: 2 },
            Instruction::Hlt,
        ]);

        let mut runner = Runner::new(cpu, Pacing::FullSpeed);
        let mut emitted = Vec::new();
        let executed = runner.run(|v| emitted.push(v)).unwrap();

        assert_eq!(executed, 5);
        assert_eq!(emitted, vec![7, 9]);
        assert!(runner.cpu.is_halted());
    }

    #[test]
    fn test_runner_stops_on_cancel() {
        // An infinite loop: jump back to self
        let cpu = load(&[Instruction::Jump { mode: JumpMode::Always, flag: 0, addr: 0 }]);

        let mut runner = Runner::new(cpu, Pacing::FullSpeed);
        let stop = runner.stop_handle();
        stop.store(true, Ordering::Relaxed);

        let executed = runner.run(|_| {}).unwrap();
        assert_eq!(executed, 0);
        assert!(runner.cpu.is_running());
    }

    #[test]
    fn test_runner_cycle_limit() {
        let cpu = load(&[Instruction::Jump { mode: JumpMode::Always, flag: 0, addr: 0 }]);

        let mut runner = Runner::new(cpu, Pacing::FullSpeed);
        let executed = runner.run_limited(10, |_| {}).unwrap();

        assert_eq!(executed, 10);
        assert!(runner.cpu.is_running());
    }

    #[test]
    fn test_runner_paced_run_completes() {
        let cpu = load(&[Instruction::Hlt]);

        let mut runner = Runner::new(cpu, Pacing::Fixed(Duration::from_millis(1)));
        let executed = runner.run(|_| {}).unwrap();

        assert_eq!(executed, 1);
        assert!(runner.into_cpu().is_halted());
    }
}
