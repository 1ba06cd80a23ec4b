//! Packet-switched mesh of Intcode instances.
//!
//! Every node boots with its address as first input, then emits packets as
//! `(destination, x, y)` output triples and polls for incoming ones; an empty
//! poll yields `-1` instead of blocking. Packets addressed to the NAT are
//! retained. Once the whole network is idle the NAT re-injects its last
//! packet into node 0, and the run ends when it injects the same Y twice in
//! a row.
//!
//! Idleness is confirmed through the router's condition variable rather
//! than by timing: a node that has polled an empty queue `idle_polls` times
//! in a row without sending parks inside the router until a packet arrives
//! for it. The network is idle exactly when every live node is parked and
//! every queue is empty; nothing can then change until the NAT acts.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;

use intcode_bytecode::Program;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{NetworkConfig, VmConfig};
use crate::error::VmError;
use crate::port::Port;
use crate::vm::Vm;

/// Value an empty poll returns to the program.
pub const NO_PACKET: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    pub destination: i64,
    pub x: i64,
    pub y: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkOutcome {
    /// Y of the first packet any node sent to the NAT.
    pub first_nat_y: i64,
    /// Y the NAT delivered to node 0 twice in a row.
    pub repeated_y: i64,
    /// Number of NAT injections performed.
    pub injections: u64,
    /// Packets delivered between nodes (NAT traffic excluded).
    pub packets_routed: u64,
}

pub struct Network {
    program: Arc<Program>,
    config: NetworkConfig,
}

impl Network {
    pub fn new(program: impl Into<Arc<Program>>) -> Self {
        Network {
            program: program.into(),
            config: NetworkConfig::default(),
        }
    }

    pub fn with_config(mut self, config: NetworkConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Boot every node on its own thread and supervise until the NAT
    /// protocol terminates or a node fails.
    pub fn run(&self) -> Result<NetworkOutcome, VmError> {
        self.config.validate()?;
        let router = Router::new(&self.config);

        thread::scope(|scope| {
            let handles: Vec<_> = (0..self.config.nodes)
                .map(|address| {
                    let router = &router;
                    let program = Arc::clone(&self.program);
                    let vm_config = &self.config.vm;
                    scope.spawn(move || {
                        run_guarded(router, address, || {
                            run_node(router, address, program, vm_config)
                        })
                    })
                })
                .collect();

            let outcome = router.supervise();
            // supervise() always leaves the router shut down, so every
            // node unparks and exits.
            for handle in handles {
                if handle.join().is_err() {
                    warn!("network node thread panicked");
                }
            }
            if let Ok(done) = &outcome {
                info!(
                    repeated_y = done.repeated_y,
                    injections = done.injections,
                    packets = done.packets_routed,
                    "network terminated"
                );
            }
            outcome
        })
    }
}

/// Run one node's body, turning a panic into a node failure so the
/// supervisor is never left waiting on a thread that is gone.
pub(crate) fn run_guarded<F: FnOnce()>(router: &Router, address: usize, body: F) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(body)) {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "node thread panicked".to_string());
        warn!(address, %message, "node panicked");
        router.node_failed(address, message);
    }
}

fn run_node(router: &Router, address: usize, program: Arc<Program>, config: &VmConfig) {
    let mut vm = Vm::with_config(program, config);
    let mut port = NicPort {
        router,
        address,
        pending: Vec::with_capacity(3),
    };

    let result = vm
        .provide_input(address as i64)
        .and_then(|_| vm.run_with(&mut port));
    match result {
        Ok(_) => {
            debug!(address, steps = vm.step_count(), "node halted");
            if !port.pending.is_empty() {
                warn!(address, partial = ?port.pending, "node halted mid-packet; partial packet dropped");
            }
            router.node_halted(address);
        }
        Err(VmError::ChannelClosed) => debug!(address, "node stopped by shutdown"),
        Err(e) => {
            warn!(address, error = %e, "node failed");
            router.node_failed(address, e.to_string());
        }
    }
}

/// Network interface of one node: input polls the node's queue, output is
/// assembled into packets and handed to the router.
struct NicPort<'r> {
    router: &'r Router,
    address: usize,
    pending: Vec<i64>,
}

impl Port for NicPort<'_> {
    fn recv(&mut self) -> Result<Option<i64>, VmError> {
        self.router.poll(self.address).map(Some)
    }

    fn send(&mut self, value: i64) -> Result<(), VmError> {
        self.pending.push(value);
        if self.pending.len() == 3 {
            let packet = Packet {
                destination: self.pending[0],
                x: self.pending[1],
                y: self.pending[2],
            };
            self.pending.clear();
            self.router.route(self.address, packet)?;
        }
        Ok(())
    }
}

struct RouterState {
    queues: Vec<VecDeque<i64>>,
    empty_polls: Vec<u32>,
    parked: Vec<bool>,
    halted: Vec<bool>,
    nat: Option<Packet>,
    first_nat_y: Option<i64>,
    packets_routed: u64,
    failure: Option<VmError>,
    shutdown: bool,
}

impl RouterState {
    fn is_idle(&self) -> bool {
        self.queues.iter().all(VecDeque::is_empty)
            && self
                .parked
                .iter()
                .zip(&self.halted)
                .all(|(&parked, &halted)| parked || halted)
    }
}

/// Shared per-address queues and idle bookkeeping. Every field is guarded
/// by the one mutex; `changed` is signalled on any state change a waiter
/// might care about.
pub(crate) struct Router {
    state: Mutex<RouterState>,
    changed: Condvar,
    nat_address: i64,
    idle_polls: u32,
}

impl Router {
    pub(crate) fn new(config: &NetworkConfig) -> Self {
        let n = config.nodes;
        Router {
            state: Mutex::new(RouterState {
                queues: vec![VecDeque::new(); n],
                empty_polls: vec![0; n],
                parked: vec![false; n],
                halted: vec![false; n],
                nat: None,
                first_nat_y: None,
                packets_routed: 0,
                failure: None,
                shutdown: false,
            }),
            changed: Condvar::new(),
            nat_address: config.nat_address,
            idle_polls: config.idle_polls,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, RouterState>, VmError> {
        self.state.lock().map_err(|_| VmError::Poisoned)
    }

    fn wait<'a>(
        &self,
        guard: MutexGuard<'a, RouterState>,
    ) -> Result<MutexGuard<'a, RouterState>, VmError> {
        self.changed.wait(guard).map_err(|_| VmError::Poisoned)
    }

    /// Next input value for `address`, or [`NO_PACKET`]. Parks the caller
    /// once it has polled an empty queue `idle_polls` times in a row.
    fn poll(&self, address: usize) -> Result<i64, VmError> {
        let mut state = self.lock()?;
        if state.shutdown {
            return Err(VmError::ChannelClosed);
        }
        if let Some(value) = state.queues[address].pop_front() {
            state.empty_polls[address] = 0;
            return Ok(value);
        }

        state.empty_polls[address] += 1;
        if state.empty_polls[address] < self.idle_polls {
            return Ok(NO_PACKET);
        }

        state.parked[address] = true;
        self.changed.notify_all();
        while state.queues[address].is_empty() && !state.shutdown {
            state = self.wait(state)?;
        }
        state.parked[address] = false;
        state.empty_polls[address] = 0;
        if state.shutdown {
            return Err(VmError::ChannelClosed);
        }
        Ok(state.queues[address].pop_front().unwrap_or(NO_PACKET))
    }

    fn route(&self, from: usize, packet: Packet) -> Result<(), VmError> {
        let mut state = self.lock()?;
        if state.shutdown {
            return Err(VmError::ChannelClosed);
        }
        state.empty_polls[from] = 0;

        if packet.destination == self.nat_address {
            if state.first_nat_y.is_none() {
                info!(from, x = packet.x, y = packet.y, "first packet to nat");
                state.first_nat_y = Some(packet.y);
            }
            state.nat = Some(packet);
            return Ok(());
        }

        let dest = usize::try_from(packet.destination)
            .ok()
            .filter(|&dest| dest < state.queues.len());
        match dest {
            Some(dest) if !state.halted[dest] => {
                // x and y are enqueued together so a reader never sees half a packet.
                state.queues[dest].push_back(packet.x);
                state.queues[dest].push_back(packet.y);
                state.packets_routed += 1;
                debug!(from, to = dest, x = packet.x, y = packet.y, "packet routed");
                self.changed.notify_all();
            }
            Some(dest) => warn!(from, to = dest, "packet to halted node dropped"),
            None => warn!(from, to = packet.destination, "packet to unknown address dropped"),
        }
        Ok(())
    }

    fn node_halted(&self, address: usize) {
        if let Ok(mut state) = self.lock() {
            state.halted[address] = true;
            state.queues[address].clear();
            self.changed.notify_all();
        }
    }

    fn node_failed(&self, address: usize, message: String) {
        if let Ok(mut state) = self.lock() {
            if state.failure.is_none() {
                state.failure = Some(VmError::NodeFailed {
                    address: address as i64,
                    message,
                });
            }
            self.changed.notify_all();
        }
    }

    /// NAT loop, run on the caller's thread. Always shuts the router down
    /// before returning.
    pub(crate) fn supervise(&self) -> Result<NetworkOutcome, VmError> {
        let mut state = self.lock()?;
        let mut last_injected: Option<i64> = None;
        let mut repeated: Option<i64> = None;
        let mut injections = 0u64;

        let result = loop {
            while state.failure.is_none() && !state.is_idle() {
                state = match self.changed.wait(state) {
                    Ok(guard) => guard,
                    Err(poisoned) => {
                        let mut guard = poisoned.into_inner();
                        guard.shutdown = true;
                        self.changed.notify_all();
                        return Err(VmError::Poisoned);
                    }
                };
            }
            if let Some(failure) = state.failure.take() {
                break Err(failure);
            }
            // The repeated delivery has been drained by node 0.
            if let Some(y) = repeated {
                break Ok(NetworkOutcome {
                    first_nat_y: state.first_nat_y.unwrap_or(y),
                    repeated_y: y,
                    injections,
                    packets_routed: state.packets_routed,
                });
            }

            let Some(packet) = state.nat else {
                debug!("network idle before any packet reached the nat");
                break Err(VmError::Deadlock);
            };
            if state.halted[0] {
                break Err(VmError::Deadlock);
            }

            state.queues[0].push_back(packet.x);
            state.queues[0].push_back(packet.y);
            injections += 1;
            info!(x = packet.x, y = packet.y, injections, "nat injected packet into node 0");
            self.changed.notify_all();

            if last_injected == Some(packet.y) {
                repeated = Some(packet.y);
            }
            last_injected = Some(packet.y);
        };

        state.shutdown = true;
        self.changed.notify_all();
        result
    }
}
