//! CPU16 Emulator - CLI Entry Point
//!
//! Commands:
//! - `cpu16-emu run <program>` - Run a ROM image or ASM file
//! - `cpu16-emu debug <program>` - Interactive debugger
//! - `cpu16-emu asm <source>` - Assemble to a ROM image
//! - `cpu16-emu disasm <rom>` - Disassemble a ROM image
//! - `cpu16-emu test` - Run the built-in self-test

use clap::{Parser, Subcommand};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "cpu16-emu")]
#[command(version = "0.1.0")]
#[command(about = "An emulator of a minimal hypothetical 16-bit CPU")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it halts
    Run {
        /// Path to the ROM image or ASM file to execute
        program: String,
        /// Maximum number of cycles to run
        #[arg(short, long, default_value = "1000000")]
        max_cycles: u64,
        /// Delay between instructions in milliseconds (0 = full speed)
        #[arg(short, long, default_value = "0")]
        delay_ms: u64,
        /// Show trace output
        #[arg(short, long)]
        trace: bool,
        /// Write the final CPU state as JSON to this file
        #[arg(long)]
        dump_state: Option<String>,
    },
    /// Interactive debugger
    Debug {
        /// Path to the ROM image or ASM file to debug
        program: String,
    },
    /// Assemble source to a ROM image
    Asm {
        /// Path to the source file
        source: String,
        /// Output ROM image file
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Disassemble a ROM image to readable text
    Disasm {
        /// Path to the ROM image
        rom: String,
    },
    /// Run the built-in self-test
    Test,
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run { program, max_cycles, delay_ms, trace, dump_state }) => {
            run_program(&program, max_cycles, delay_ms, trace, dump_state.as_deref());
        }
        Some(Commands::Debug { program }) => {
            debug_program(&program);
        }
        Some(Commands::Asm { source, output }) => {
            assemble_file(&source, output);
        }
        Some(Commands::Disasm { rom }) => {
            disassemble_file(&rom);
        }
        Some(Commands::Test) => {
            run_self_test();
        }
        None => {
            println!("CPU16 Emulator v0.1.0");
            println!("An emulator of a minimal hypothetical 16-bit CPU");
            println!();
            println!("Use --help for available commands");
            println!();
            demo_instruction_format();
        }
    }
}

/// Load a program: assemble `.asm` sources, parse everything else as a
/// ROM image.
fn load_program_file(path: &str) -> Vec<cpu16::Word> {
    use cpu16::{assemble, load_image};

    if path.ends_with(".asm") {
        let source = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("❌ Failed to read file: {}", e);
                std::process::exit(1);
            }
        };

        match assemble(&source) {
            Ok(words) => {
                println!("📝 Assembled {} words", words.len());
                words
            }
            Err(e) => {
                eprintln!("❌ Assembly error: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        match load_image(path) {
            Ok(image) => {
                println!("📂 Loaded {} words", image.len());
                image.words
            }
            Err(e) => {
                eprintln!("❌ Failed to load ROM image: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn run_program(path: &str, max_cycles: u64, delay_ms: u64, trace: bool, dump_state: Option<&str>) {
    use cpu16::{Cpu, Runner, Pacing};
    use cpu16::asm::disasm::disassemble_instruction;

    println!("🔧 Running: {}", path);

    let words = load_program_file(path);
    if words.is_empty() {
        eprintln!("❌ No words to execute");
        std::process::exit(1);
    }

    let mut cpu = Cpu::new();
    if let Err(e) = cpu.load_program(&words) {
        eprintln!("❌ Failed to load program: {}", e);
        std::process::exit(1);
    }

    println!();
    println!("━━━ Execution ━━━");

    let pacing = if delay_ms > 0 {
        Pacing::Fixed(Duration::from_millis(delay_ms))
    } else {
        Pacing::FullSpeed
    };

    let cpu = if trace {
        // Manual step loop so every instruction can be printed
        let mut cpu = cpu;
        while cpu.is_running() && cpu.cycles < max_cycles {
            let pc = cpu.regs.pc();
            let word = cpu.rom.read(pc);
            let operand = cpu.rom.read(pc.wrapping_add(1));

            match cpu.step() {
                Ok(_) => {
                    println!("0x{:04X}: {:<20} flags=0x{:04X}",
                        pc, disassemble_instruction(word, operand), cpu.regs.flags());
                    for value in cpu.take_output() {
                        println!("  OUT → {}", value);
                    }
                }
                Err(e) => {
                    eprintln!("❌ CPU error at pc=0x{:04X}: {}", pc, e);
                    std::process::exit(1);
                }
            }

            if cpu.is_running() && delay_ms > 0 {
                std::thread::sleep(Duration::from_millis(delay_ms));
            }
        }
        cpu
    } else {
        let mut runner = Runner::new(cpu, pacing);
        if let Err(e) = runner.run_limited(max_cycles, |value| println!("{}", value)) {
            eprintln!("❌ CPU error: {}", e);
            std::process::exit(1);
        }
        runner.into_cpu()
    };

    println!();
    println!("━━━ Result ━━━");
    println!("Cycles: {}", cpu.cycles);
    println!("State: {:?}", cpu.state);
    println!("pc:    0x{:04X}", cpu.regs.pc());
    println!("flags: 0x{:04X}", cpu.regs.flags());
    for i in 2..8 {
        println!("r{}:    0x{:04X} ({})", i, cpu.regs.get(i), cpu.regs.get(i));
    }

    if cpu.is_running() && cpu.cycles >= max_cycles {
        println!();
        println!("⚠️  Reached max cycles limit ({}). Use --max-cycles to increase.", max_cycles);
    }

    if let Some(out_path) = dump_state {
        match serde_json::to_string_pretty(&cpu) {
            Ok(json) => {
                if let Err(e) = std::fs::write(out_path, json) {
                    eprintln!("❌ Failed to write state dump: {}", e);
                    std::process::exit(1);
                }
                println!("✓ State dumped to {}", out_path);
            }
            Err(e) => {
                eprintln!("❌ Failed to serialize state: {}", e);
                std::process::exit(1);
            }
        }
    }
}

#[cfg(feature = "tui")]
fn debug_program(path: &str) {
    use cpu16::tui::run_debugger;

    println!("🔍 Loading: {}", path);

    let words = load_program_file(path);
    if words.is_empty() {
        eprintln!("❌ No words to execute");
        std::process::exit(1);
    }

    println!("🚀 Launching debugger...");
    println!();

    if let Err(e) = run_debugger(words) {
        eprintln!("❌ Debugger error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "tui"))]
fn debug_program(_path: &str) {
    eprintln!("❌ This build has no debugger; rebuild with the `tui` feature");
    std::process::exit(1);
}

fn assemble_file(source_path: &str, output: Option<String>) {
    use cpu16::{assemble, save_image};

    let out_path = output.unwrap_or_else(|| source_path.replace(".asm", ".rom"));

    println!("📝 Assembling: {} → {}", source_path, out_path);

    let source = match std::fs::read_to_string(source_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("❌ Failed to read file: {}", e);
            std::process::exit(1);
        }
    };

    let words = match assemble(&source) {
        Ok(words) => words,
        Err(e) => {
            eprintln!("❌ Assembly error: {}", e);
            std::process::exit(1);
        }
    };

    println!("✓ Assembled {} words", words.len());

    if let Err(e) = save_image(&out_path, &words) {
        eprintln!("❌ Failed to save ROM image: {}", e);
        std::process::exit(1);
    }

    println!("✓ Saved to {}", out_path);
}

fn disassemble_file(rom_path: &str) {
    use cpu16::{load_image, disassemble};

    println!("📖 Disassembling: {}", rom_path);
    println!();

    let image = match load_image(rom_path) {
        Ok(i) => i,
        Err(e) => {
            eprintln!("❌ Failed to load ROM image: {}", e);
            std::process::exit(1);
        }
    };

    println!("{}", disassemble(&image.words));
}

fn demo_instruction_format() {
    use cpu16::bits::nibble;
    use cpu16::asm::disasm::disassemble_instruction;

    println!("━━━ Instruction Format Demo ━━━");
    println!();

    let word = 0x0234;
    println!("Every instruction is two 16-bit words. The first packs four nibbles:");
    println!("  0x{:04X} → opcode={:X} a={:X} b={:X} c={:X}",
        word, nibble(word, 1), nibble(word, 2), nibble(word, 3), nibble(word, 4));
    println!("  which decodes as: {}", disassemble_instruction(word, 0));
    println!();

    println!("The second word is an immediate or address where needed:");
    println!("  0xA301 0x002A → {}", disassemble_instruction(0xA301, 0x002A));
    println!("  0xE100 0x0006 → {}", disassemble_instruction(0xE100, 0x0006));
    println!();

    println!("✓ Try `cpu16-emu run demos/fibonacci.asm`");
}

fn run_self_test() {
    use cpu16::{Cpu, Runner, Pacing};
    use cpu16::bits::{nibble, get_bit, set_bit};
    use cpu16::cpu::decode::{decode, encode, Instruction};

    println!("━━━ CPU16 Emulator Self-Test ━━━");
    println!();

    let mut passed = 0;
    let mut failed = 0;

    // Test 1: nibble extraction
    print!("Nibble extraction... ");
    let word = 0x1234;
    if (1..=4).all(|p| nibble(word, p) == p as u16) {
        println!("✓"); passed += 1;
    } else {
        println!("✗"); failed += 1;
    }

    // Test 2: bit set/get roundtrip
    print!("Bit set/get roundtrip... ");
    let mut ok = true;
    for pos in 0..16 {
        let mut w = 0u16;
        set_bit(&mut w, pos, true);
        if !get_bit(w, pos) {
            ok = false;
            break;
        }
        set_bit(&mut w, pos, false);
        if w != 0 {
            ok = false;
            break;
        }
    }
    if ok { println!("✓"); passed += 1; }
    else { println!("✗"); failed += 1; }

    // Test 3: encode/decode roundtrip
    print!("Encode/decode roundtrip... ");
    let instr = Instruction::Add { a: 2, b: 3, dst: 4 };
    let [w, o] = encode(&instr);
    if w == 0x0234 && decode(w, o) == instr {
        println!("✓"); passed += 1;
    } else {
        println!("✗"); failed += 1;
    }

    // Test 4: unprogrammed CPU halts
    print!("Unprogrammed CPU halts... ");
    let mut cpu = Cpu::new();
    let result = cpu.run();
    if result.is_ok() && cpu.is_halted() && cpu.cycles == 1 {
        println!("✓"); passed += 1;
    } else {
        println!("✗"); failed += 1;
    }

    // Test 5: arithmetic wraps at 16 bits
    print!("16-bit wraparound... ");
    let mut cpu = Cpu::new();
    let program: Vec<u16> = [
        Instruction::Ldv { dst: 2, value: 0xFFFF },
        Instruction::Ldv { dst: 3, value: 2 },
        Instruction::Add { a: 2, b: 3, dst: 4 },
        Instruction::Hlt,
    ]
    .iter()
    .flat_map(encode)
    .collect();
    cpu.load_program(&program).unwrap();
    cpu.run().unwrap();
    if cpu.regs.get(4) == 1 {
        println!("✓"); passed += 1;
    } else {
        println!("✗ (got {})", cpu.regs.get(4));
        failed += 1;
    }

    // Test 6: Fibonacci program
    print!("Fibonacci program... ");
    let fib = [
        0xA200, 0x0000, 0xA300, 0x0001, 0x0234, 0x0000, 0x7400, 0x0000, 0x6320,
        0x0000, 0x6430, 0x0000, 0x0234, 0x0000, 0x5430, 0x0000, 0xE100, 0x0006,
    ];
    let mut cpu = Cpu::new();
    cpu.load_program(&fib).unwrap();
    let mut emitted = Vec::new();
    let mut runner = Runner::new(cpu, Pacing::FullSpeed);
    let result = runner.run(|v| emitted.push(v));
    if result.is_ok() && emitted.starts_with(&[1, 2, 3, 5, 8, 13]) && emitted.ends_with(&[46368]) {
        println!("✓"); passed += 1;
    } else {
        println!("✗ (emitted {:?}...)", &emitted[..emitted.len().min(6)]);
        failed += 1;
    }

    println!();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Results: {} passed, {} failed", passed, failed);

    if failed == 0 {
        println!("✓ All tests passed!");
    } else {
        std::process::exit(1);
    }
}
