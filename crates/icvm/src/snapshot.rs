use std::collections::VecDeque;
use std::sync::Arc;

use intcode_bytecode::Program;
use serde::{Deserialize, Serialize};

use crate::config::VmConfig;
use crate::error::VmError;
use crate::memory::Memory;
use crate::vm::{RunStatus, Status, Vm};

/// Current version of the snapshot format.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Maximum supported version (for forward-compat rejection).
const MAX_SUPPORTED_VERSION: u32 = 1;

/// Complete captured VM state, independent of the VM it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default = "default_version")]
    version: u32,
    pub program: Program,
    pub memory: Memory,
    pub ip: usize,
    pub relative_base: i64,
    pub status: Status,
    #[serde(default)]
    pub pending_inputs: Vec<i64>,
    #[serde(default)]
    pub last_output: Option<i64>,
    #[serde(default)]
    pub step_count: u64,
}

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

impl Snapshot {
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn to_json(&self) -> Result<String, VmError> {
        serde_json::to_string_pretty(self).map_err(|e| VmError::Serialization(e.to_string()))
    }

    /// Deserialize from JSON, rejecting snapshots newer than this build
    /// understands.
    pub fn from_json(json: &str) -> Result<Self, VmError> {
        let snapshot: Snapshot =
            serde_json::from_str(json).map_err(|e| VmError::Serialization(e.to_string()))?;
        if snapshot.version > MAX_SUPPORTED_VERSION {
            return Err(VmError::Serialization(format!(
                "unsupported snapshot version {}: max supported is {}",
                snapshot.version, MAX_SUPPORTED_VERSION
            )));
        }
        Ok(snapshot)
    }
}

impl Vm {
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            version: SNAPSHOT_VERSION,
            program: (*self.program).clone(),
            memory: self.memory.clone(),
            ip: self.ip,
            relative_base: self.relative_base,
            status: self.status,
            pending_inputs: self.inputs.iter().copied().collect(),
            last_output: self.last_output,
            step_count: self.step_count,
        }
    }

    /// Overwrite this VM's execution state with a snapshot. The program
    /// image is replaced too, so `reset` afterwards returns to the
    /// snapshot's program.
    pub fn restore(&mut self, snapshot: &Snapshot) {
        if *self.program != snapshot.program {
            self.program = Arc::new(snapshot.program.clone());
        }
        self.memory = snapshot.memory.clone();
        self.ip = snapshot.ip;
        self.relative_base = snapshot.relative_base;
        self.status = snapshot.status;
        self.inputs = snapshot.pending_inputs.iter().copied().collect::<VecDeque<_>>();
        self.last_output = snapshot.last_output;
        self.step_count = snapshot.step_count;
    }

    /// Rebuild a VM from a snapshot with default limits. The snapshot's
    /// memory ceiling is kept.
    pub fn from_snapshot(snapshot: &Snapshot) -> Vm {
        let mut vm = Vm::new(snapshot.program.clone());
        vm.restore(snapshot);
        vm
    }

    /// Rebuild a VM from a snapshot under `config`: step ceiling, memory
    /// ceiling and tracing all come from the config.
    pub fn from_snapshot_with_config(snapshot: &Snapshot, config: &VmConfig) -> Vm {
        let mut vm = Vm::with_config(snapshot.program.clone(), config);
        vm.restore(snapshot);
        vm.memory = Memory::new(snapshot.memory.cells().to_vec(), config.max_memory);
        vm
    }
}

/// Result of running one continuation from a checkpoint.
#[derive(Debug, Clone)]
pub struct Fork {
    /// Output produced by this continuation only.
    pub outputs: Vec<i64>,
    pub status: RunStatus,
    /// The forked VM, positioned at its next input request (or halted).
    pub vm: Vm,
}

/// What a breadth-first visitor decides about a fork.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// Keep expanding this fork.
    Continue,
    /// Do not expand this fork further.
    Prune,
    /// Stop the search and return this fork.
    Found,
}

/// Checkpoint-and-fork driver for interactive programs.
///
/// The checkpoint is a VM parked at an input request. Every trial clones
/// it, so trials never observe each other and never re-execute the prefix.
#[derive(Debug, Clone)]
pub struct Explorer {
    checkpoint: Vm,
    outputs: Vec<i64>,
    status: RunStatus,
}

impl Explorer {
    /// Run `vm` to its first input request (or halt) and checkpoint there.
    pub fn new(mut vm: Vm) -> Result<Self, VmError> {
        let outcome = vm.run(&[])?;
        Ok(Explorer {
            checkpoint: vm,
            outputs: outcome.outputs,
            status: outcome.status,
        })
    }

    /// Output produced on the way to the current checkpoint.
    pub fn outputs(&self) -> &[i64] {
        &self.outputs
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn checkpoint(&self) -> &Vm {
        &self.checkpoint
    }

    pub fn into_vm(self) -> Vm {
        self.checkpoint
    }

    /// Fork the checkpoint, feed `inputs`, and report what happened. The
    /// checkpoint itself is untouched.
    pub fn try_inputs(&self, inputs: &[i64]) -> Result<Fork, VmError> {
        fork_from(&self.checkpoint, inputs)
    }

    /// First candidate (in iteration order) whose fork satisfies `accept`.
    pub fn search<I, C, F>(&self, candidates: I, mut accept: F) -> Result<Option<(C, Fork)>, VmError>
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[i64]>,
        F: FnMut(&Fork) -> bool,
    {
        for candidate in candidates {
            let fork = self.try_inputs(candidate.as_ref())?;
            if accept(&fork) {
                return Ok(Some((candidate, fork)));
            }
        }
        Ok(None)
    }

    /// Commit `inputs` on the checkpoint itself, moving it forward.
    pub fn advance(&mut self, inputs: &[i64]) -> Result<&[i64], VmError> {
        if self.checkpoint.is_halted() {
            return Err(VmError::Halted);
        }
        let outcome = self.checkpoint.run(inputs)?;
        self.outputs = outcome.outputs;
        self.status = outcome.status;
        Ok(&self.outputs)
    }

    /// Breadth-first search over input sequences built from `moves`.
    ///
    /// Each level forks every surviving VM once per move. `visit` sees the
    /// path of move indices and the resulting fork; halted forks are never
    /// expanded. Returns the first fork the visitor marks as found, with
    /// its path.
    pub fn breadth_first<F>(
        &self,
        moves: &[Vec<i64>],
        max_depth: usize,
        mut visit: F,
    ) -> Result<Option<(Vec<usize>, Fork)>, VmError>
    where
        F: FnMut(&[usize], &Fork) -> Visit,
    {
        if self.checkpoint.is_halted() {
            return Ok(None);
        }

        let mut frontier: VecDeque<(Vec<usize>, Vm)> = VecDeque::new();
        frontier.push_back((Vec::new(), self.checkpoint.clone()));

        while let Some((path, vm)) = frontier.pop_front() {
            if path.len() >= max_depth {
                continue;
            }
            for (idx, inputs) in moves.iter().enumerate() {
                let fork = fork_from(&vm, inputs)?;
                let mut child_path = path.clone();
                child_path.push(idx);
                match visit(&child_path, &fork) {
                    Visit::Found => return Ok(Some((child_path, fork))),
                    Visit::Prune => {}
                    Visit::Continue if fork.status == RunStatus::Halted => {}
                    Visit::Continue => frontier.push_back((child_path, fork.vm)),
                }
            }
        }

        Ok(None)
    }
}

fn fork_from(vm: &Vm, inputs: &[i64]) -> Result<Fork, VmError> {
    let mut vm = vm.clone();
    let outcome = vm.run(inputs)?;
    Ok(Fork {
        outputs: outcome.outputs,
        status: outcome.status,
        vm,
    })
}
