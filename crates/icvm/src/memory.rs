use intcode_bytecode::Program;
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_MAX_MEMORY;
use crate::error::VmError;

/// Why a memory access was refused. Turned into a [`VmError`] carrying the
/// faulting instruction pointer by [`MemoryFault::at`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryFault {
    Negative(i64),
    Limit { address: i64, limit: usize },
}

impl MemoryFault {
    pub fn at(self, ip: usize) -> VmError {
        match self {
            MemoryFault::Negative(address) => VmError::NegativeAddress { address, ip },
            MemoryFault::Limit { address, limit } => VmError::MemoryLimit { address, limit },
        }
    }
}

/// Growable, zero-extended integer tape.
///
/// Logically infinite in the positive direction: any access at or past the
/// current length grows the backing buffer to `address + 1` cells. Negative
/// addresses are always refused, for reads as well as writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memory {
    cells: Vec<i64>,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_MAX_MEMORY
}

impl Memory {
    pub fn new(cells: Vec<i64>, limit: usize) -> Self {
        Memory { cells, limit }
    }

    pub fn from_program(program: &Program, limit: usize) -> Self {
        Memory::new(program.cells().to_vec(), limit)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn cells(&self) -> &[i64] {
        &self.cells
    }

    pub fn read(&mut self, address: i64) -> Result<i64, MemoryFault> {
        let idx = self.ensure(address)?;
        Ok(self.cells[idx])
    }

    pub fn write(&mut self, address: i64, value: i64) -> Result<(), MemoryFault> {
        let idx = self.ensure(address)?;
        self.cells[idx] = value;
        Ok(())
    }

    /// Read without growing. Cells past the end read as zero.
    pub fn peek(&self, address: i64) -> Result<i64, MemoryFault> {
        let idx = self.check(address)?;
        Ok(self.cells.get(idx).copied().unwrap_or(0))
    }

    fn check(&self, address: i64) -> Result<usize, MemoryFault> {
        if address < 0 {
            return Err(MemoryFault::Negative(address));
        }
        let idx = usize::try_from(address).map_err(|_| MemoryFault::Limit {
            address,
            limit: self.limit,
        })?;
        if idx >= self.limit {
            return Err(MemoryFault::Limit {
                address,
                limit: self.limit,
            });
        }
        Ok(idx)
    }

    fn ensure(&mut self, address: i64) -> Result<usize, MemoryFault> {
        let idx = self.check(address)?;
        if idx >= self.cells.len() {
            // Vec::resize reserves geometrically, keeping growth amortized O(1).
            self.cells.resize(idx + 1, 0);
        }
        Ok(idx)
    }
}
