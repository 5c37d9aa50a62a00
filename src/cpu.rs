use crate::alu::alu;
use crate::call_stack::CallStack;
use crate::config::MachineConfig;
use crate::decoder::Instruction;
use crate::error::{Address, ConfigError, CpuError, Fault};
use crate::flags::Flags;
use crate::memory::{Memory, MEMORY_SIZE};
use crate::metrics::{record_fault, record_halt, record_instruction, Timer};
use crate::output::{Output, OutputSink};
use crate::registers::{RegisterFile, REGISTER_COUNT};
use crate::snapshot::{MachineSnapshot, RunStatus};
use crate::stack::{self, StackBounds};

/// The fetch-decode-execute engine.
///
/// Owns every piece of machine state. One instruction completes, with all
/// of its effects, before the next is fetched; a failing instruction
/// applies none of its effects.
#[derive(Debug, Clone)]
pub struct CPU {
    memory: Memory,
    registers: RegisterFile,
    flags: Flags,
    call_stack: CallStack,
    pc: usize,
    state: State,
    config: MachineConfig,

    // Bytes occupied by the loaded program; the data stack stays above it.
    program_len: usize,
    steps: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Running,
    Halted,
    Faulted(Fault),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// An instruction ran and the machine can keep going.
    Executed,
    /// HLT has been reached. PC stays on the HLT.
    Halted,
}

/// Result of [`CPU::run`] or [`CPU::run_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Instructions executed by this call, not counting HLT.
    pub steps: u64,
    pub halted: bool,
}

// What an instruction asks the engine to do with the PC.
enum Flow {
    Next,
    Jump(usize),
    Halt,
}

impl CPU {
    pub fn new() -> Self {
        let config = MachineConfig::default();
        CPU {
            memory: Memory::new(),
            registers: Self::initial_registers(&config),
            flags: Flags::default(),
            call_stack: CallStack::new(config.call_stack_limit),
            pc: 0,
            state: State::Running,
            config,
            program_len: 0,
            steps: 0,
        }
    }

    pub fn with_config(config: MachineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut cpu = CPU::new();
        cpu.config = config;
        cpu.call_stack = CallStack::new(config.call_stack_limit);
        cpu.reset();
        Ok(cpu)
    }

    fn initial_registers(config: &MachineConfig) -> RegisterFile {
        let mut registers = RegisterFile::new();
        registers.set_sp(config.stack_top);
        registers
    }

    /// Return to the power-on state. Memory keeps the loaded program.
    pub fn reset(&mut self) {
        self.registers = Self::initial_registers(&self.config);
        self.flags = Flags::default();
        self.call_stack.clear();
        self.pc = 0;
        self.state = State::Running;
        self.steps = 0;
    }

    /// Clear memory, copy `program` in from address 0 and reset.
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), CpuError> {
        if program.len() > MEMORY_SIZE {
            return Err(CpuError::AddressOutOfRange(Address::Memory(program.len() - 1)));
        }
        self.memory.clear();
        self.memory.load(program, 0)?;
        self.program_len = program.len();
        self.reset();
        Ok(())
    }

    pub fn step(&mut self, out: &mut dyn OutputSink) -> Result<StepOutcome, Fault> {
        match &self.state {
            State::Running => {}
            State::Halted => return Ok(StepOutcome::Halted),
            State::Faulted(fault) => return Err(fault.clone()),
        }

        let pc = self.pc;
        let opcode = match self.memory.read(pc) {
            Ok(opcode) => opcode,
            Err(error) => return Err(self.fault(pc, None, error)),
        };

        let timer = Timer::new();
        let instruction = match Instruction::decode(opcode) {
            Ok(instruction) => instruction,
            Err(error) => return Err(self.fault(pc, Some(opcode), error)),
        };

        let operand_count = instruction.operand_count();
        let mut operands = [0u8; 2];
        for (i, operand) in operands.iter_mut().take(operand_count).enumerate() {
            *operand = match self.memory.read(pc + 1 + i) {
                Ok(value) => value,
                Err(error) => return Err(self.fault(pc, Some(opcode), error)),
            };
        }

        let flow = match self.execute(instruction, operands, out) {
            Ok(flow) => flow,
            Err(error) => return Err(self.fault(pc, Some(opcode), error)),
        };

        record_instruction(opcode, instruction.mnemonic(), timer.elapsed());

        match flow {
            Flow::Halt => {
                self.state = State::Halted;
                record_halt();
                log::debug!("HLT at PC ${:02X} after {} steps", pc, self.steps);
                return Ok(StepOutcome::Halted);
            }
            Flow::Next => self.pc = pc + 1 + operand_count,
            Flow::Jump(target) => self.pc = target,
        }
        self.steps += 1;

        log::trace!(
            "${:02X}: {} {:02X} {:02X} -> PC ${:02X}",
            pc,
            instruction.mnemonic(),
            operands[0],
            operands[1],
            self.pc
        );
        Ok(StepOutcome::Executed)
    }

    /// Step until HLT or a fault.
    pub fn run(&mut self, out: &mut dyn OutputSink) -> Result<RunSummary, Fault> {
        let mut steps = 0;
        loop {
            match self.step(out)? {
                StepOutcome::Executed => steps += 1,
                StepOutcome::Halted => return Ok(RunSummary { steps, halted: true }),
            }
        }
    }

    /// Step at most `max_steps` times, stopping early on HLT.
    pub fn run_for(
        &mut self,
        max_steps: u64,
        out: &mut dyn OutputSink,
    ) -> Result<RunSummary, Fault> {
        let mut steps = 0;
        while steps < max_steps {
            match self.step(out)? {
                StepOutcome::Executed => steps += 1,
                StepOutcome::Halted => return Ok(RunSummary { steps, halted: true }),
            }
        }
        Ok(RunSummary {
            steps,
            halted: self.is_halted(),
        })
    }

    fn fault(&mut self, pc: usize, opcode: Option<u8>, error: CpuError) -> Fault {
        let fault = Fault { pc, opcode, error };
        record_fault(fault.error.kind());
        log::warn!("machine fault: {}", fault);
        self.state = State::Faulted(fault.clone());
        fault
    }

    fn stack_bounds(&self) -> StackBounds {
        let program_end = u8::try_from(self.program_len).unwrap_or(u8::MAX);
        StackBounds {
            top: self.config.stack_top,
            floor: self.config.stack_floor.max(program_end),
        }
    }

    // Every arm validates before it mutates, so an error leaves the machine
    // exactly as it was before the instruction.
    fn execute(
        &mut self,
        instruction: Instruction,
        operands: [u8; 2],
        out: &mut dyn OutputSink,
    ) -> Result<Flow, CpuError> {
        let [a, b] = operands;
        let flow = match instruction {
            Instruction::Nop => Flow::Next,
            Instruction::Hlt => Flow::Halt,

            // -- Data movement --
            Instruction::Ldi => {
                self.registers.set(a, b)?;
                Flow::Next
            }
            Instruction::Ld => {
                let address = self.registers.get(b)?;
                let value = self.memory.read(address as usize)?;
                self.registers.set(a, value)?;
                Flow::Next
            }
            Instruction::St => {
                let address = self.registers.get(a)?;
                let value = self.registers.get(b)?;
                self.memory.write(address as usize, value)?;
                Flow::Next
            }
            Instruction::Prn => {
                out.emit(Output::Number(self.registers.get(a)?));
                Flow::Next
            }
            Instruction::Pra => {
                out.emit(Output::Char(self.registers.get(a)?));
                Flow::Next
            }

            // -- Stack --
            Instruction::Push => {
                let value = self.registers.get(a)?;
                stack::push(self.stack_bounds(), &mut self.memory, &mut self.registers, value)?;
                Flow::Next
            }
            Instruction::Pop => {
                self.registers.get(a)?;
                let value = stack::pop(self.stack_bounds(), &self.memory, &mut self.registers)?;
                self.registers.set(a, value)?;
                Flow::Next
            }

            // -- Control transfer --
            Instruction::Call => {
                let target = self.registers.get(a)?;
                self.call_stack.push(self.pc + 2)?;
                Flow::Jump(target as usize)
            }
            Instruction::Ret => Flow::Jump(self.call_stack.pop()?),
            Instruction::Jmp => Flow::Jump(self.registers.get(a)? as usize),
            Instruction::Jeq => self.jump_if(a, self.flags.equal())?,
            Instruction::Jne => self.jump_if(a, !self.flags.equal())?,
            Instruction::Jgt => self.jump_if(a, self.flags.greater_than())?,
            Instruction::Jlt => self.jump_if(a, self.flags.less_than())?,
            Instruction::Jle => {
                self.jump_if(a, self.flags.less_than() || self.flags.equal())?
            }
            Instruction::Jge => {
                self.jump_if(a, self.flags.greater_than() || self.flags.equal())?
            }

            // -- ALU --
            Instruction::Cmp => {
                let x = self.registers.get(a)?;
                let y = self.registers.get(b)?;
                self.flags = Flags::compare(x, y);
                Flow::Next
            }
            Instruction::Alu(op) => {
                let x = self.registers.get(a)?;
                let y = if op.is_unary() { 0 } else { self.registers.get(b)? };
                let result = alu(op, x, y)?;
                self.registers.set(a, result)?;
                Flow::Next
            }
        };
        Ok(flow)
    }

    fn jump_if(&self, reg: u8, condition: bool) -> Result<Flow, CpuError> {
        let target = self.registers.get(reg)?;
        if condition {
            Ok(Flow::Jump(target as usize))
        } else {
            Ok(Flow::Next)
        }
    }

    // Getters
    pub fn get_pc(&self) -> usize { self.pc }
    pub fn get_register(&self, index: u8) -> Result<u8, CpuError> { self.registers.get(index) }
    pub fn get_registers(&self) -> [u8; REGISTER_COUNT] { self.registers.as_array() }
    pub fn get_sp(&self) -> u8 { self.registers.sp() }
    pub fn get_flags(&self) -> Flags { self.flags }
    pub fn get_steps(&self) -> u64 { self.steps }
    pub fn call_depth(&self) -> usize { self.call_stack.depth() }
    pub fn config(&self) -> &MachineConfig { &self.config }
    pub fn memory(&self) -> &Memory { &self.memory }
    pub fn is_halted(&self) -> bool { self.state == State::Halted }

    pub fn fault_info(&self) -> Option<&Fault> {
        match &self.state {
            State::Faulted(fault) => Some(fault),
            _ => None,
        }
    }

    pub fn status(&self) -> RunStatus {
        match self.state {
            State::Running => RunStatus::Running,
            State::Halted => RunStatus::Halted,
            State::Faulted(_) => RunStatus::Faulted,
        }
    }

    /// Poke a byte into memory from outside the instruction stream.
    pub fn write_memory(&mut self, address: usize, value: u8) -> Result<(), CpuError> {
        self.memory.write(address, value)
    }

    /// Up to `length` bytes from `address`, cut short at the end of memory.
    pub fn read_memory(&self, address: usize, length: usize) -> Vec<u8> {
        let slice = self.memory.as_slice();
        let start = address.min(slice.len());
        let end = address.saturating_add(length).min(slice.len());
        slice[start..end].to_vec()
    }

    pub fn snapshot(&self) -> MachineSnapshot {
        MachineSnapshot {
            pc: self.pc,
            opcode: self.memory.read(self.pc).ok(),
            operands: [
                self.memory.read(self.pc + 1).ok(),
                self.memory.read(self.pc + 2).ok(),
            ],
            registers: self.registers.as_array(),
            flags: self.flags,
            status: self.status(),
            fault: self.fault_info().cloned(),
            call_depth: self.call_stack.depth(),
            steps: self.steps,
        }
    }
}

impl Default for CPU {
    fn default() -> Self {
        Self::new()
    }
}
