pub mod ascii;
pub mod config;
pub mod error;
pub mod memory;
pub mod network;
pub mod pipeline;
pub mod port;
pub mod snapshot;
pub mod vm;

pub use ascii::{Session, Transcript};
pub use config::{NetworkConfig, PipelineConfig, VmConfig};
pub use error::VmError;
pub use intcode_bytecode::Program;
pub use memory::Memory;
pub use network::{Network, NetworkOutcome, Packet, NO_PACKET};
pub use pipeline::{max_signal, Pipeline};
pub use port::{BufferPort, Port};
pub use snapshot::{Explorer, Fork, Snapshot, Visit};
pub use vm::{RunOutcome, RunStatus, Status, Vm};
