use std::collections::VecDeque;
use std::sync::Arc;

use intcode_bytecode::disasm::format_instruction;
use intcode_bytecode::{DecodeError, Instruction, Mode, Opcode, Program};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::VmConfig;
use crate::error::VmError;
use crate::memory::Memory;
use crate::port::{BufferPort, Detached, Port};

/// Execution state after the most recent step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Running,
    /// Suspended at an Input instruction with nothing queued. The
    /// instruction re-executes once input is supplied.
    NeedsInput,
    /// The last step emitted this value.
    HasOutput(i64),
    /// Terminal.
    Halted,
}

/// How a batch run stopped. Running out of input is not an error: supply
/// more and call run again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Halted,
    AwaitingInput,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub outputs: Vec<i64>,
    pub status: RunStatus,
}

/// An Intcode virtual machine instance.
///
/// Owns its memory outright; cloning produces a fully independent fork that
/// shares only the immutable program image.
#[derive(Debug, Clone)]
pub struct Vm {
    pub(crate) program: Arc<Program>,
    pub(crate) memory: Memory,
    pub(crate) ip: usize,
    pub(crate) relative_base: i64,
    pub(crate) status: Status,
    /// Values supplied through `provide_input`, consumed before the port.
    pub(crate) inputs: VecDeque<i64>,
    pub(crate) last_output: Option<i64>,
    pub(crate) step_count: u64,
    max_steps: u64,
    /// Trace log for debugging.
    pub trace: Vec<String>,
    pub trace_enabled: bool,
}

impl Vm {
    pub fn new(program: impl Into<Arc<Program>>) -> Self {
        Vm::with_config(program, &VmConfig::default())
    }

    pub fn with_config(program: impl Into<Arc<Program>>, config: &VmConfig) -> Self {
        let program = program.into();
        Vm {
            memory: Memory::from_program(&program, config.max_memory),
            program,
            ip: 0,
            relative_base: 0,
            status: Status::Running,
            inputs: VecDeque::new(),
            last_output: None,
            step_count: 0,
            max_steps: config.max_steps,
            trace: Vec::new(),
            trace_enabled: config.trace,
        }
    }

    /// Parse program text and build a VM over it.
    pub fn load(text: &str) -> Result<Vm, VmError> {
        Ok(Vm::new(Program::parse(text)?))
    }

    pub fn set_max_steps(&mut self, max: u64) {
        self.max_steps = max;
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn ip(&self) -> usize {
        self.ip
    }

    pub fn relative_base(&self) -> i64 {
        self.relative_base
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_halted(&self) -> bool {
        self.status == Status::Halted
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn last_output(&self) -> Option<i64> {
        self.last_output
    }

    pub fn pending_inputs(&self) -> usize {
        self.inputs.len()
    }

    /// Queue an input value. A VM suspended in `NeedsInput` becomes runnable.
    pub fn provide_input(&mut self, value: i64) -> Result<(), VmError> {
        if self.is_halted() {
            return Err(VmError::Halted);
        }
        self.inputs.push_back(value);
        if self.status == Status::NeedsInput {
            self.status = Status::Running;
        }
        Ok(())
    }

    pub fn provide_inputs(&mut self, values: &[i64]) -> Result<(), VmError> {
        values.iter().try_for_each(|&v| self.provide_input(v))
    }

    /// Read a memory cell without growing memory.
    pub fn peek(&self, address: i64) -> Result<i64, VmError> {
        self.memory.peek(address).map_err(|f| f.at(self.ip))
    }

    /// Overwrite a memory cell, e.g. to patch a program before it runs.
    pub fn poke(&mut self, address: i64, value: i64) -> Result<(), VmError> {
        self.memory.write(address, value).map_err(|f| f.at(self.ip))
    }

    /// Restore the pristine program image and initial registers.
    pub fn reset(&mut self) {
        self.memory = Memory::from_program(&self.program, self.memory.limit());
        self.ip = 0;
        self.relative_base = 0;
        self.status = Status::Running;
        self.inputs.clear();
        self.last_output = None;
        self.step_count = 0;
        self.trace.clear();
    }

    /// Execute exactly one instruction using only the VM's own input queue.
    pub fn step(&mut self) -> Result<Status, VmError> {
        self.execute(&mut Detached)
    }

    /// Queue `inputs`, then run until the VM halts or needs more input.
    pub fn run(&mut self, inputs: &[i64]) -> Result<RunOutcome, VmError> {
        self.inputs.extend(inputs);
        let mut port = BufferPort::default();
        let status = self.run_with(&mut port)?;
        Ok(RunOutcome {
            outputs: port.outputs,
            status,
        })
    }

    /// Run against an arbitrary port until the VM halts or the port has no
    /// input to offer.
    pub fn run_with<P: Port>(&mut self, port: &mut P) -> Result<RunStatus, VmError> {
        loop {
            match self.execute(port)? {
                Status::Running | Status::HasOutput(_) => {}
                Status::NeedsInput => return Ok(RunStatus::AwaitingInput),
                Status::Halted => return Ok(RunStatus::Halted),
            }
        }
    }

    /// Decode and execute the instruction at `ip`.
    fn execute<P: Port>(&mut self, port: &mut P) -> Result<Status, VmError> {
        if self.status == Status::Halted {
            return Ok(Status::Halted);
        }
        if self.step_count >= self.max_steps {
            return Err(VmError::ExecutionLimitExceeded(self.max_steps));
        }

        let ip = self.ip;
        let word = self.memory.read(ip as i64).map_err(|f| f.at(ip))?;
        let instr = Instruction::decode(word).map_err(|source| VmError::Decode { ip, source })?;

        // Pushed only once the instruction has executed, so a suspended
        // Input leaves no line behind.
        let trace_line = self.trace_enabled.then(|| self.trace_line(ip, &instr));

        let status = match instr.opcode {
            Opcode::Add | Opcode::Mul | Opcode::LessThan | Opcode::Equals => {
                let a = self.operand(&instr, 0)?;
                let b = self.operand(&instr, 1)?;
                let result = match instr.opcode {
                    Opcode::Add => a.checked_add(b),
                    Opcode::Mul => a.checked_mul(b),
                    Opcode::LessThan => Some((a < b) as i64),
                    _ => Some((a == b) as i64),
                }
                .ok_or(VmError::ArithmeticOverflow { ip })?;
                let target = self.target(&instr, 2)?;
                self.store(target, result)?;
                self.ip = ip + 4;
                Status::Running
            }
            Opcode::Input => {
                let target = self.target(&instr, 0)?;
                let value = match self.inputs.pop_front() {
                    Some(v) => Some(v),
                    None => port.recv()?,
                };
                match value {
                    Some(v) => {
                        self.store(target, v)?;
                        self.ip = ip + 2;
                        Status::Running
                    }
                    None => {
                        // Suspend: ip stays on the Input so it re-executes on resume.
                        debug!(ip, steps = self.step_count, "vm awaiting input");
                        self.status = Status::NeedsInput;
                        return Ok(Status::NeedsInput);
                    }
                }
            }
            Opcode::Output => {
                let value = self.operand(&instr, 0)?;
                port.send(value)?;
                self.last_output = Some(value);
                self.ip = ip + 2;
                Status::HasOutput(value)
            }
            Opcode::JumpIfTrue | Opcode::JumpIfFalse => {
                let cond = self.operand(&instr, 0)?;
                let dest = self.operand(&instr, 1)?;
                let taken = (cond != 0) == (instr.opcode == Opcode::JumpIfTrue);
                if taken {
                    self.ip = usize::try_from(dest)
                        .map_err(|_| VmError::NegativeJump { target: dest, ip })?;
                } else {
                    self.ip = ip + 3;
                }
                Status::Running
            }
            Opcode::AdjustRelativeBase => {
                let delta = self.operand(&instr, 0)?;
                self.relative_base = self
                    .relative_base
                    .checked_add(delta)
                    .ok_or(VmError::ArithmeticOverflow { ip })?;
                self.ip = ip + 2;
                Status::Running
            }
            Opcode::Halt => {
                debug!(steps = self.step_count + 1, ip, "vm halted");
                Status::Halted
            }
        };

        if let Some(line) = trace_line {
            self.trace.push(line);
        }
        self.step_count += 1;
        self.status = status;
        Ok(status)
    }

    /// Raw parameter `param` of the current instruction.
    fn param(&mut self, param: usize) -> Result<i64, VmError> {
        let ip = self.ip;
        self.memory
            .read((ip + 1 + param) as i64)
            .map_err(|f| f.at(ip))
    }

    /// Resolve parameter `param` to a value according to its mode.
    fn operand(&mut self, instr: &Instruction, param: usize) -> Result<i64, VmError> {
        let raw = self.param(param)?;
        let ip = self.ip;
        match instr.mode(param) {
            Mode::Immediate => Ok(raw),
            Mode::Position => self.memory.read(raw).map_err(|f| f.at(ip)),
            Mode::Relative => {
                let address = self.relative_address(raw)?;
                self.memory.read(address).map_err(|f| f.at(ip))
            }
        }
    }

    /// Resolve parameter `param` to a write address.
    fn target(&mut self, instr: &Instruction, param: usize) -> Result<i64, VmError> {
        let raw = self.param(param)?;
        match instr.mode(param) {
            Mode::Position => Ok(raw),
            Mode::Relative => self.relative_address(raw),
            // Unreachable after a successful decode.
            Mode::Immediate => Err(VmError::Decode {
                ip: self.ip,
                source: DecodeError::ImmediateWrite {
                    opcode: instr.opcode,
                },
            }),
        }
    }

    fn relative_address(&self, offset: i64) -> Result<i64, VmError> {
        self.relative_base
            .checked_add(offset)
            .ok_or(VmError::ArithmeticOverflow { ip: self.ip })
    }

    fn store(&mut self, address: i64, value: i64) -> Result<(), VmError> {
        let ip = self.ip;
        self.memory.write(address, value).map_err(|f| f.at(ip))
    }

    fn trace_line(&self, ip: usize, instr: &Instruction) -> String {
        let params: Vec<i64> = (0..instr.opcode.arity())
            .map(|i| self.memory.peek((ip + 1 + i) as i64).unwrap_or(0))
            .collect();
        format!(
            "[{ip:04}] {}  rb={}",
            format_instruction(instr, &params),
            self.relative_base
        )
    }
}
