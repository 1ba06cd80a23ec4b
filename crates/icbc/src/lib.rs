pub mod disasm;
pub mod lexer;
pub mod opcode;
pub mod program;

pub use opcode::{DecodeError, Instruction, Mode, Opcode};
pub use program::{BytecodeError, ParseError, Program};
