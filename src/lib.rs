//! # LS-8 Emulator
//!
//! An emulator for the LS-8, a small 8-bit stored-program computer with
//! 256 bytes of memory, eight general-purpose registers and a compact
//! instruction set.
//!
//! ## Features
//!
//! - Fetch/decode/execute engine with arithmetic wrapping modulo 256
//! - Data stack in memory (R7 is the stack pointer) and a separate call stack
//! - Typed faults instead of panics: a bad program stops the machine, never the host
//! - `.ls8` listing loader and an instruction trace for debugging
//! - HTTP server hosting many isolated machines, with Prometheus metrics
//!
//! ## Example
//!
//! ```rust
//! use ls8_emulator::cpu::CPU;
//! use ls8_emulator::loader::parse_program;
//! use ls8_emulator::output::RecordingSink;
//!
//! let program = parse_program(
//!     "10000010 # LDI R0,8\n00000000\n00001000\n\
//!      01000111 # PRN R0\n00000000\n\
//!      00000001 # HLT\n",
//! )
//! .unwrap();
//!
//! let mut cpu = CPU::new();
//! cpu.load_program(&program).unwrap();
//!
//! let mut out = RecordingSink::new();
//! cpu.run(&mut out).unwrap();
//!
//! assert_eq!(out.numbers(), vec![8]);
//! assert!(cpu.is_halted());
//! ```

#![recursion_limit = "2048"]

pub mod alu;
pub mod call_stack;
pub mod config;
pub mod cpu;
pub mod decoder;
pub mod error;
pub mod flags;
pub mod loader;
pub mod memory;
pub mod metrics;
pub mod output;
pub mod registers;
pub mod server;
pub mod snapshot;
pub mod stack;
pub mod trace;

pub use config::MachineConfig;
pub use cpu::{RunSummary, StepOutcome, CPU};
pub use error::{CpuError, Fault, LoadError};
pub use memory::Memory;
pub use output::{Output, OutputSink, RecordingSink, StdoutSink};
pub use snapshot::{MachineSnapshot, RunStatus};
