use serde::{Deserialize, Serialize};

use crate::error::VmError;

pub const DEFAULT_MAX_STEPS: u64 = 100_000_000;
/// 16 Mi cells (128 MiB).
pub const DEFAULT_MAX_MEMORY: usize = 1 << 24;

/// Per-instance execution limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Maximum instructions executed over the lifetime of the instance.
    pub max_steps: u64,
    /// Memory never grows beyond this many cells.
    pub max_memory: usize,
    /// Record a human-readable line per executed instruction.
    pub trace: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            max_steps: DEFAULT_MAX_STEPS,
            max_memory: DEFAULT_MAX_MEMORY,
            trace: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Route the last stage's output back into the first stage.
    pub feedback: bool,
    /// Value fed to the first stage right after its phase setting.
    pub initial_signal: i64,
    pub vm: VmConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            feedback: false,
            initial_signal: 0,
            vm: VmConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Number of nodes; addresses are `0..nodes`.
    pub nodes: usize,
    /// Packets sent here are retained by the NAT instead of delivered.
    pub nat_address: i64,
    /// Consecutive empty polls after which a node counts as idle and blocks.
    pub idle_polls: u32,
    pub vm: VmConfig,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            nodes: 50,
            nat_address: 255,
            idle_polls: 2,
            vm: VmConfig::default(),
        }
    }
}

impl NetworkConfig {
    pub fn validate(&self) -> Result<(), VmError> {
        if self.nodes == 0 {
            return Err(VmError::InvalidConfig("network needs at least one node".into()));
        }
        if self.nat_address >= 0 && (self.nat_address as u64) < self.nodes as u64 {
            return Err(VmError::InvalidConfig(format!(
                "nat address {} collides with node range 0..{}",
                self.nat_address, self.nodes
            )));
        }
        if self.idle_polls == 0 {
            return Err(VmError::InvalidConfig("idle_polls must be at least 1".into()));
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, VmError> {
        let config: NetworkConfig =
            serde_json::from_str(json).map_err(|e| VmError::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}
