//! ASCII conventions for text-driven programs: commands go in one byte per
//! input value terminated by a newline, and printable output comes back the
//! same way.

use crate::error::VmError;
use crate::vm::{RunStatus, Vm};

/// Encode one command line: its bytes followed by `\n`.
pub fn encode_line(line: &str) -> Vec<i64> {
    line.bytes()
        .map(i64::from)
        .chain(std::iter::once(i64::from(b'\n')))
        .collect()
}

/// Split output into ASCII text and the values that are not ASCII (a
/// program typically reports a final answer as one large integer).
pub fn decode(values: &[i64]) -> (String, Vec<i64>) {
    let mut text = String::new();
    let mut other = Vec::new();
    for &v in values {
        match u8::try_from(v) {
            Ok(byte) if byte.is_ascii() => text.push(char::from(byte)),
            _ => other.push(v),
        }
    }
    (text, other)
}

/// Everything a text program printed between two input requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub text: String,
    /// Non-ASCII values, in order.
    pub values: Vec<i64>,
    pub status: RunStatus,
}

/// A text session over a VM, one command line at a time.
#[derive(Debug, Clone)]
pub struct Session {
    vm: Vm,
}

impl Session {
    pub fn new(vm: Vm) -> Self {
        Session { vm }
    }

    /// Run up to the first prompt.
    pub fn start(&mut self) -> Result<Transcript, VmError> {
        self.feed(&[])
    }

    /// Send one command line and collect the response.
    pub fn send(&mut self, command: &str) -> Result<Transcript, VmError> {
        if self.vm.is_halted() {
            return Err(VmError::Halted);
        }
        self.feed(&encode_line(command))
    }

    /// Independent copy of the session for trying out a branch.
    pub fn fork(&self) -> Session {
        self.clone()
    }

    pub fn is_halted(&self) -> bool {
        self.vm.is_halted()
    }

    pub fn vm(&self) -> &Vm {
        &self.vm
    }

    pub fn into_vm(self) -> Vm {
        self.vm
    }

    fn feed(&mut self, inputs: &[i64]) -> Result<Transcript, VmError> {
        let outcome = self.vm.run(inputs)?;
        let (text, values) = decode(&outcome.outputs);
        Ok(Transcript {
            text,
            values,
            status: outcome.status,
        })
    }
}
