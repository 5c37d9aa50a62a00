use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};

use ls8_emulator::config::{MachineConfig, DEFAULT_CALL_STACK_LIMIT, DEFAULT_STACK_TOP};
use ls8_emulator::cpu::{StepOutcome, CPU};
use ls8_emulator::loader;
use ls8_emulator::output::StdoutSink;
use ls8_emulator::server;
use ls8_emulator::trace::TraceLine;

#[derive(Parser, Debug)]
#[command(name = "ls8")]
#[command(about = "Emulator for the LS-8 8-bit computer", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a .ls8 listing and run it until HLT
    Run {
        /// Path to the .ls8 program listing
        program: PathBuf,

        /// Print a trace line to stderr before every instruction
        #[arg(long, action = ArgAction::SetTrue)]
        trace: bool,

        /// Give up after this many instructions
        #[arg(long)]
        max_steps: Option<u64>,

        /// Initial stack pointer (R7)
        #[arg(long, default_value_t = DEFAULT_STACK_TOP)]
        stack_top: u8,

        /// Lowest address PUSH may write to
        #[arg(long, default_value_t = 0)]
        stack_floor: u8,

        /// Maximum nesting depth of CALL
        #[arg(long, default_value_t = DEFAULT_CALL_STACK_LIMIT)]
        call_stack_limit: usize,
    },
    /// Host machines behind an HTTP API
    Serve {
        #[arg(long, default_value = "127.0.0.1:3030")]
        addr: SocketAddr,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let result = match args.command {
        Command::Run {
            program,
            trace,
            max_steps,
            stack_top,
            stack_floor,
            call_stack_limit,
        } => {
            let config = MachineConfig {
                stack_top,
                stack_floor,
                call_stack_limit,
            };
            run_program(program, config, trace, max_steps)
        }
        Command::Serve { addr } => serve(addr),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run_program(
    path: PathBuf,
    config: MachineConfig,
    trace: bool,
    max_steps: Option<u64>,
) -> Result<ExitCode> {
    let program = loader::load_file(&path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    let mut cpu = CPU::with_config(config).context("invalid machine configuration")?;
    cpu.load_program(&program)
        .with_context(|| format!("failed to load {}", path.display()))?;
    log::info!("loaded {} bytes from {}", program.len(), path.display());

    let mut out = StdoutSink;
    loop {
        if max_steps.is_some_and(|limit| cpu.get_steps() >= limit) {
            log::warn!("stopped after {} steps without reaching HLT", cpu.get_steps());
            return Ok(ExitCode::from(2));
        }
        if trace {
            eprintln!("{}", TraceLine(&cpu.snapshot()));
        }
        match cpu.step(&mut out) {
            Ok(StepOutcome::Executed) => {}
            Ok(StepOutcome::Halted) => break,
            Err(fault) => {
                eprintln!("error: {}", fault);
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    if cpu.call_depth() > 0 {
        log::warn!("halted with {} unreturned CALLs", cpu.call_depth());
    }
    log::info!("halted after {} steps", cpu.get_steps());
    Ok(ExitCode::SUCCESS)
}

fn serve(addr: SocketAddr) -> Result<ExitCode> {
    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    runtime.block_on(server::run_server(addr));
    Ok(ExitCode::SUCCESS)
}
