//! CLI front-end for the LoongArch64 user-mode emulator (spec.md §6).
//!
//! Grounded on the teacher's `src/bin/emulate.rs` (`clap::Parser` derive,
//! `clap_num::maybe_hex` for numeric flags), restructured around a single
//! `simulate()` call instead of a step-by-step debug loop since this
//! emulator's debugging story is `--precise`, not interactive breakpoints.

use clap::Parser;
use clap_num::maybe_hex;
use loongarch_emu::interpreter::StepOutcome;
use loongarch_emu::machine::Machine;
use std::process::ExitCode;
use std::time::Instant;

/// Run a 64-bit LoongArch ELF binary.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the guest ELF binary
    input: String,

    /// Arguments passed through to the guest program as argv[1..]
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    guest_args: Vec<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Suppress emulator-level logging entirely
    #[arg(short, long)]
    silent: bool,

    /// Print wall-clock execution time on exit
    #[arg(short, long)]
    timing: bool,

    /// Print decoder-cache statistics on exit
    #[arg(long)]
    stats: bool,

    /// Single-step through the precise interpreter instead of the
    /// threaded-bytecode fast path
    #[arg(long)]
    precise: bool,

    /// Instruction budget, or "max" to run until the guest exits on its own
    #[arg(short, long, default_value = "max")]
    fuel: String,

    /// Guest address space size in MiB
    #[arg(short, long, default_value_t = 256, value_parser = maybe_hex::<u64>)]
    memory: u64,
}

fn parse_fuel(s: &str) -> u64 {
    if s.eq_ignore_ascii_case("max") {
        u64::MAX
    } else {
        s.parse().unwrap_or_else(|_| {
            eprintln!("invalid --fuel value {s:?}, expected a number or \"max\"");
            std::process::exit(2);
        })
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    if args.silent {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    } else if args.verbose {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }

    let data = match std::fs::read(&args.input) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("error reading {}: {e}", args.input);
            return ExitCode::FAILURE;
        }
    };

    let memory_size = args.memory * 1024 * 1024;
    let mut machine = match Machine::new_from_elf(&data, memory_size) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("error loading ELF: {e}");
            return ExitCode::FAILURE;
        }
    };

    machine.setup_linux_syscalls();
    machine.set_precise(args.precise);

    let mut argv = vec![args.input.clone()];
    argv.extend(args.guest_args.iter().cloned());
    let envp: Vec<String> = std::env::vars().map(|(k, v)| format!("{k}={v}")).collect();
    machine.setup_linux(&argv, &envp);

    let fuel = parse_fuel(&args.fuel);
    let start = Instant::now();

    let outcome = machine.simulate(fuel);

    if args.timing {
        log::info!("execution took {:?}", start.elapsed());
    }
    if args.stats {
        let stats = machine.collect_bytecode_statistics();
        log::info!(
            "stats: {} instructions run, {} segments cached process-wide, \
             {} segments touched by this machine, {} fallback instructions",
            stats.instructions_run,
            stats.segments_cached_process_wide,
            stats.segments_touched_by_this_machine,
            stats.fallback_instructions,
        );
    }

    match outcome {
        Ok(StepOutcome::Stopped) => ExitCode::from(machine.exit_code().unwrap_or(0) as u8),
        Ok(StepOutcome::FuelExhausted) => {
            eprintln!("fuel exhausted before the guest exited");
            ExitCode::FAILURE
        }
        Ok(other) => {
            eprintln!("unexpected dispatch outcome: {other:?}");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("machine fault: {e}");
            ExitCode::FAILURE
        }
    }
}
