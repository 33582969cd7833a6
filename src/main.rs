//! LS-8 Emulator - CLI Entry Point
//!
//! Commands:
//! - `ls8-emu run <program>` - Run an .ls8 image or .asm file
//! - `ls8-emu asm <source>` - Assemble source to an .ls8 image
//! - `ls8-emu disasm <image>` - Disassemble an image to readable text

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ls8-emu")]
#[command(version = "0.1.0")]
#[command(about = "An emulator for the LS-8 8-bit instructional computer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it halts
    Run {
        /// Path to the .ls8 image or .asm file to execute
        program: String,
        /// Maximum number of instructions to run
        #[arg(short, long, default_value = "100000")]
        max_cycles: u64,
        /// Print a machine trace before each instruction
        #[arg(short, long)]
        trace: bool,
    },
    /// Assemble source to an .ls8 image
    Asm {
        /// Path to the source file
        source: String,
        /// Output image file
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Disassemble an .ls8 image to readable text
    Disasm {
        /// Path to the image file
        image: String,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            program,
            max_cycles,
            trace,
        } => {
            run_program(&program, max_cycles, trace);
        }
        Commands::Asm { source, output } => {
            assemble_file(&source, output);
        }
        Commands::Disasm { image } => {
            disassemble_file(&image);
        }
    }
}

/// Load program bytes from either an .ls8 image or an .asm source file.
///
/// A missing or unreadable file exits with code 2; the program itself
/// misbehaving is never conflated with that.
fn load_bytes(path: &str) -> Vec<u8> {
    if path.ends_with(".asm") {
        let source = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("❌ Failed to read {}: {}", path, e);
                std::process::exit(2);
            }
        };

        match ls8::assemble(&source) {
            Ok(bytes) => bytes,
            Err(e) => {
                eprintln!("❌ Assembly error: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        match ls8::load_image(path) {
            Ok(image) => image.bytes,
            Err(e) => {
                eprintln!("❌ Failed to load {}: {}", path, e);
                std::process::exit(2);
            }
        }
    }
}

fn run_program(path: &str, max_cycles: u64, trace: bool) {
    use ls8::Cpu;

    let bytes = load_bytes(path);

    if bytes.is_empty() {
        eprintln!("❌ No program bytes to execute");
        std::process::exit(1);
    }

    let mut cpu = Cpu::new();
    if let Err(e) = cpu.load_program(&bytes) {
        eprintln!("❌ Failed to load program: {}", e);
        std::process::exit(1);
    }

    let mut cycles = 0u64;
    while cpu.is_running() && cycles < max_cycles {
        if trace {
            eprintln!("{}", cpu.trace());
        }

        match cpu.step() {
            Ok(_) => cycles += 1,
            Err(e) => {
                eprintln!("❌ CPU fault at PC={:02X}: {}", cpu.regs.pc, e);
                std::process::exit(1);
            }
        }
    }

    if cpu.is_running() {
        eprintln!(
            "⚠️  Reached max cycles limit ({}). Use --max-cycles to increase.",
            max_cycles
        );
        std::process::exit(1);
    }

    if trace {
        eprintln!("State: {:?}, {} instructions executed", cpu.state, cycles);
    }
}

fn assemble_file(source_path: &str, output: Option<String>) {
    use ls8::ProgramImage;

    let out_path = output.unwrap_or_else(|| source_path.replace(".asm", ".ls8"));

    println!("📝 Assembling: {} → {}", source_path, out_path);

    let source = match std::fs::read_to_string(source_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("❌ Failed to read {}: {}", source_path, e);
            std::process::exit(2);
        }
    };

    let bytes = match ls8::assemble(&source) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("❌ Assembly error: {}", e);
            std::process::exit(1);
        }
    };

    println!("✓ Assembled {} bytes", bytes.len());

    let mut image = ProgramImage::new();
    for byte in bytes {
        image.push(byte, "");
    }

    if let Err(e) = ls8::save_image(&out_path, &image) {
        eprintln!("❌ Failed to save image: {}", e);
        std::process::exit(1);
    }

    println!("✓ Saved to {}", out_path);
}

fn disassemble_file(image_path: &str) {
    let image = match ls8::load_image(image_path) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("❌ Failed to load {}: {}", image_path, e);
            std::process::exit(2);
        }
    };

    print!("{}", ls8::disassemble(&image.bytes));
}
