//! Property tests for the instruction semantics.

use cpu16::cpu::decode::{decode, encode, Instruction};
use cpu16::cpu::{Cpu, FLAG_GREATER, FLAG_EQUAL, FLAG_LESS};
use cpu16::Word;
use proptest::prelude::*;

/// Build a CPU, load the encoded instructions and run to halt.
fn run(instructions: &[Instruction]) -> Cpu {
    let words: Vec<Word> = instructions.iter().flat_map(encode).collect();
    let mut cpu = Cpu::new();
    cpu.load_program(&words).unwrap();
    cpu.run().unwrap();
    cpu
}

proptest! {
    #[test]
    fn add_wraps_modulo_65536(x: u16, y: u16) {
        let cpu = run(&[
            Instruction::Ldv { dst: 2, value: x },
            Instruction::Ldv { dst: 3, value: y },
            Instruction::Add { a: 2, b: 3, dst: 4 },
            Instruction::Hlt,
        ]);
        prop_assert_eq!(cpu.regs.get(4), x.wrapping_add(y));
    }

    #[test]
    fn sub_wraps_modulo_65536(x: u16, y: u16) {
        let cpu = run(&[
            Instruction::Ldv { dst: 2, value: x },
            Instruction::Ldv { dst: 3, value: y },
            Instruction::Sub { a: 2, b: 3, dst: 4 },
            Instruction::Hlt,
        ]);
        prop_assert_eq!(cpu.regs.get(4), x.wrapping_sub(y));
    }

    #[test]
    fn cmp_sets_exactly_one_flag_matching_unsigned_order(x: u16, y: u16) {
        let cpu = run(&[
            Instruction::Ldv { dst: 2, value: x },
            Instruction::Ldv { dst: 3, value: y },
            Instruction::Cmp { a: 2, b: 3 },
            Instruction::Hlt,
        ]);

        let condition_bits = cpu.regs.flags() & 0x7;
        prop_assert_eq!(condition_bits.count_ones(), 1);

        let expected = if x > y {
            1 << FLAG_GREATER
        } else if x == y {
            1 << FLAG_EQUAL
        } else {
            1 << FLAG_LESS
        };
        prop_assert_eq!(condition_bits, expected);
    }

    #[test]
    fn cmp_with_self_is_equal(x: u16) {
        let cpu = run(&[
            Instruction::Ldv { dst: 2, value: x },
            Instruction::Cmp { a: 2, b: 2 },
            Instruction::Hlt,
        ]);
        prop_assert_eq!(cpu.regs.flags() & 0x7, 1 << FLAG_EQUAL);
    }

    #[test]
    fn cpy_then_cmp_is_equal(x: u16) {
        let cpu = run(&[
            Instruction::Ldv { dst: 2, value: x },
            Instruction::Cpy { src: 2, dst: 5 },
            Instruction::Cmp { a: 2, b: 5 },
            Instruction::Hlt,
        ]);
        prop_assert_eq!(cpu.regs.flags() & 0x7, 1 << FLAG_EQUAL);
    }

    #[test]
    fn ldv_then_out_emits_exactly_the_value(v: u16) {
        let words: Vec<Word> = [
            Instruction::Ldv { dst: 2, value: v },
            Instruction::Out { src: 2 },
            Instruction::Hlt,
        ]
        .iter()
        .flat_map(encode)
        .collect();

        let mut cpu = Cpu::new();
        cpu.load_program(&words).unwrap();
        cpu.run().unwrap();
        prop_assert_eq!(cpu.take_output(), vec![v]);
    }

    #[test]
    fn mov_then_ld_roundtrips_through_ram(v: u16, addr: u16) {
        let cpu = run(&[
            Instruction::Ldv { dst: 2, value: v },
            Instruction::Mov { src: 2, addr },
            Instruction::Ld { dst: 3, addr },
            Instruction::Cmp { a: 2, b: 3 },
            Instruction::Hlt,
        ]);
        prop_assert_eq!(cpu.regs.get(3), v);
        prop_assert!(cpu.regs.flag(FLAG_EQUAL));
    }

    #[test]
    fn unassigned_opcodes_halt(op in 0xBu16..=0xDu16, low in 0u16..0x1000, operand: u16) {
        let word = (op << 12) | low;

        let mut cpu = Cpu::new();
        cpu.load_program(&[word, operand]).unwrap();
        cpu.step().unwrap();
        prop_assert!(cpu.is_halted());

        // Halt is permanent until reset
        prop_assert!(cpu.step().is_err());
        cpu.reset();
        prop_assert!(cpu.is_running());
    }

    #[test]
    fn decode_is_total(word: u16, operand: u16) {
        // Every word pair decodes to something; no panic, no error
        let _ = decode(word, operand);
    }
}
