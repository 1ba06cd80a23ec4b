use std::collections::VecDeque;

use crate::error::VmError;

/// The outside world as seen by the Input and Output instructions.
///
/// The execution engine is shared by every topology; only the port differs:
/// an in-memory buffer for direct embedding, blocking channels for the
/// pipeline, and a non-blocking polling queue for the mesh network.
pub trait Port {
    /// Next input value. `Ok(None)` suspends the VM at the Input instruction
    /// without consuming it.
    fn recv(&mut self) -> Result<Option<i64>, VmError>;

    fn send(&mut self, value: i64) -> Result<(), VmError>;
}

/// Synchronous port: inputs are taken from a queue, outputs collected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferPort {
    pub inputs: VecDeque<i64>,
    pub outputs: Vec<i64>,
}

impl BufferPort {
    pub fn new(inputs: impl IntoIterator<Item = i64>) -> Self {
        BufferPort {
            inputs: inputs.into_iter().collect(),
            outputs: Vec::new(),
        }
    }

    pub fn push_input(&mut self, value: i64) {
        self.inputs.push_back(value);
    }

    pub fn take_outputs(&mut self) -> Vec<i64> {
        std::mem::take(&mut self.outputs)
    }
}

impl Port for BufferPort {
    fn recv(&mut self) -> Result<Option<i64>, VmError> {
        Ok(self.inputs.pop_front())
    }

    fn send(&mut self, value: i64) -> Result<(), VmError> {
        self.outputs.push(value);
        Ok(())
    }
}

/// Port with nothing behind it, used by single-stepping: only the VM's own
/// input queue feeds Input, and outputs are reported through the returned
/// status.
pub(crate) struct Detached;

impl Port for Detached {
    fn recv(&mut self) -> Result<Option<i64>, VmError> {
        Ok(None)
    }

    fn send(&mut self, _value: i64) -> Result<(), VmError> {
        Ok(())
    }
}
