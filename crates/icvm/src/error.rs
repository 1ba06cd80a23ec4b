use intcode_bytecode::{BytecodeError, DecodeError, ParseError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VmError {
    #[error("decode fault at ip {ip}: {source}")]
    Decode {
        ip: usize,
        #[source]
        source: DecodeError,
    },

    #[error("negative address {address} at ip {ip}")]
    NegativeAddress { address: i64, ip: usize },

    #[error("negative jump target {target} at ip {ip}")]
    NegativeJump { target: i64, ip: usize },

    #[error("address {address} exceeds memory limit ({limit} cells)")]
    MemoryLimit { address: i64, limit: usize },

    #[error("arithmetic overflow at ip {ip}")]
    ArithmeticOverflow { ip: usize },

    #[error("max execution steps exceeded ({0})")]
    ExecutionLimitExceeded(u64),

    #[error("vm has halted")]
    Halted,

    #[error("channel closed")]
    ChannelClosed,

    #[error("pipeline produced no output")]
    NoOutput,

    #[error("shared router state poisoned")]
    Poisoned,

    #[error("deadlock: every instance is waiting for input that can never arrive")]
    Deadlock,

    #[error("node {address} failed: {message}")]
    NodeFailed { address: i64, message: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("bytecode error: {0}")]
    Bytecode(#[from] BytecodeError),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
}
