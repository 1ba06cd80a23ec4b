use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while splitting an instruction word into opcode and modes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unknown opcode {0}")]
    UnknownOpcode(i64),

    #[error("invalid mode {mode} for parameter {param}")]
    InvalidMode { mode: i64, param: usize },

    #[error("immediate mode used as write target of {opcode}")]
    ImmediateWrite { opcode: Opcode },
}

/// Intcode instructions. The discriminant is the numeric opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    /// `c = a + b`
    Add = 1,
    /// `c = a * b`
    Mul = 2,
    /// Consume one input value into `a`.
    Input = 3,
    /// Emit `a`.
    Output = 4,
    /// Jump to `b` if `a != 0`.
    JumpIfTrue = 5,
    /// Jump to `b` if `a == 0`.
    JumpIfFalse = 6,
    /// `c = (a < b) as i64`
    LessThan = 7,
    /// `c = (a == b) as i64`
    Equals = 8,
    /// `relative_base += a`
    AdjustRelativeBase = 9,
    Halt = 99,
}

impl Opcode {
    pub fn from_code(code: i64) -> Option<Opcode> {
        let op = match code {
            1 => Opcode::Add,
            2 => Opcode::Mul,
            3 => Opcode::Input,
            4 => Opcode::Output,
            5 => Opcode::JumpIfTrue,
            6 => Opcode::JumpIfFalse,
            7 => Opcode::LessThan,
            8 => Opcode::Equals,
            9 => Opcode::AdjustRelativeBase,
            99 => Opcode::Halt,
            _ => return None,
        };
        Some(op)
    }

    pub fn code(self) -> i64 {
        self as i64
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Add => "Add",
            Opcode::Mul => "Mul",
            Opcode::Input => "In",
            Opcode::Output => "Out",
            Opcode::JumpIfTrue => "Jnz",
            Opcode::JumpIfFalse => "Jz",
            Opcode::LessThan => "Lt",
            Opcode::Equals => "Eq",
            Opcode::AdjustRelativeBase => "Arb",
            Opcode::Halt => "Halt",
        }
    }

    /// Number of parameters following the instruction word.
    pub fn arity(self) -> usize {
        match self {
            Opcode::Add | Opcode::Mul | Opcode::LessThan | Opcode::Equals => 3,
            Opcode::JumpIfTrue | Opcode::JumpIfFalse => 2,
            Opcode::Input | Opcode::Output | Opcode::AdjustRelativeBase => 1,
            Opcode::Halt => 0,
        }
    }

    /// Index of the parameter this opcode writes through, if any.
    pub fn write_param(self) -> Option<usize> {
        match self {
            Opcode::Add | Opcode::Mul | Opcode::LessThan | Opcode::Equals => Some(2),
            Opcode::Input => Some(0),
            _ => None,
        }
    }

    /// Instruction width in cells, including the instruction word itself.
    pub fn width(self) -> usize {
        1 + self.arity()
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.mnemonic(), self.code())
    }
}

/// Parameter addressing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Parameter is an address: `mem[p]`.
    Position,
    /// Parameter is the value itself.
    Immediate,
    /// Parameter is an offset from the relative base: `mem[rb + p]`.
    Relative,
}

impl Mode {
    pub fn from_digit(digit: i64) -> Option<Mode> {
        match digit {
            0 => Some(Mode::Position),
            1 => Some(Mode::Immediate),
            2 => Some(Mode::Relative),
            _ => None,
        }
    }
}

/// A decoded instruction word: opcode plus one mode per parameter slot.
///
/// Mode digits beyond the opcode's arity are ignored and reported as
/// `Position`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub modes: [Mode; 3],
}

impl Instruction {
    pub fn decode(word: i64) -> Result<Instruction, DecodeError> {
        let code = word % 100;
        let opcode = Opcode::from_code(code).ok_or(DecodeError::UnknownOpcode(code))?;

        let mut modes = [Mode::Position; 3];
        let mut digits = word / 100;
        for (param, slot) in modes.iter_mut().enumerate().take(opcode.arity()) {
            let digit = digits % 10;
            *slot = Mode::from_digit(digit).ok_or(DecodeError::InvalidMode { mode: digit, param })?;
            digits /= 10;
        }

        if let Some(target) = opcode.write_param() {
            if modes[target] == Mode::Immediate {
                return Err(DecodeError::ImmediateWrite { opcode });
            }
        }

        Ok(Instruction { opcode, modes })
    }

    pub fn mode(&self, param: usize) -> Mode {
        self.modes[param]
    }
}
