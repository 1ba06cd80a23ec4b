use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use intcode_bytecode::Program;
use tracing::debug;

use crate::config::{PipelineConfig, VmConfig};
use crate::error::VmError;
use crate::port::Port;
use crate::vm::{RunStatus, Vm};

/// A chain of instances running the same program, each stage's output
/// feeding the next stage's input.
///
/// Every stage first receives its phase setting; the first stage then
/// receives the initial signal. With feedback enabled the last stage's
/// output loops back into the first. The result is the last value the final
/// stage emitted once every stage has halted.
#[derive(Debug, Clone)]
pub struct Pipeline {
    program: Arc<Program>,
    phases: Vec<i64>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(program: impl Into<Arc<Program>>, phases: Vec<i64>) -> Self {
        Pipeline {
            program: program.into(),
            phases,
            config: PipelineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn feedback(mut self, enabled: bool) -> Self {
        self.config.feedback = enabled;
        self
    }

    pub fn phases(&self) -> &[i64] {
        &self.phases
    }

    /// One OS thread per stage, connected by blocking channels.
    pub fn run_threaded(&self) -> Result<i64, VmError> {
        let n = self.stage_count()?;

        let (txs, rxs): (Vec<Sender<i64>>, Vec<Receiver<i64>>) =
            (0..n).map(|_| mpsc::channel()).unzip();
        for (tx, &phase) in txs.iter().zip(&self.phases) {
            tx.send(phase).map_err(|_| VmError::ChannelClosed)?;
        }
        txs[0]
            .send(self.config.initial_signal)
            .map_err(|_| VmError::ChannelClosed)?;

        // Without feedback the final stage writes into a sink nobody reads;
        // the result is taken from the stage's last output instead.
        let (sink, _sink_rx) = mpsc::channel();
        let outs: Vec<Sender<i64>> = (0..n)
            .map(|i| {
                if i + 1 < n {
                    txs[i + 1].clone()
                } else if self.config.feedback {
                    txs[0].clone()
                } else {
                    sink.clone()
                }
            })
            .collect();
        // Stages must hold the only senders so a halted producer is observable.
        drop(txs);
        drop(sink);

        let results: Vec<Result<Option<i64>, VmError>> = thread::scope(|scope| {
            let handles: Vec<_> = rxs
                .into_iter()
                .zip(outs)
                .enumerate()
                .map(|(stage, (rx, tx))| {
                    let program = Arc::clone(&self.program);
                    let vm_config = &self.config.vm;
                    scope.spawn(move || run_stage(stage, program, vm_config, rx, tx))
                })
                .collect();
            handles
                .into_iter()
                .enumerate()
                .map(|(stage, handle)| {
                    handle.join().unwrap_or_else(|_| {
                        Err(VmError::NodeFailed {
                            address: stage as i64,
                            message: "stage thread panicked".into(),
                        })
                    })
                })
                .collect()
        });

        collect_result(results)
    }

    /// Deterministic single-threaded round-robin over the stages.
    pub fn run_scheduled(&self) -> Result<i64, VmError> {
        let n = self.stage_count()?;

        let mut stages: Vec<Stage> = self
            .phases
            .iter()
            .map(|&phase| Stage {
                vm: Vm::with_config(Arc::clone(&self.program), &self.config.vm),
                inbox: VecDeque::from([phase]),
                status: StageStatus::Runnable,
            })
            .collect();
        stages[0].inbox.push_back(self.config.initial_signal);

        loop {
            if stages.iter().all(|s| s.status == StageStatus::Halted) {
                return stages[n - 1].vm.last_output().ok_or(VmError::NoOutput);
            }

            let mut progressed = false;
            for idx in 0..n {
                if stages[idx].status == StageStatus::Halted {
                    continue;
                }

                let before = stages[idx].vm.step_count();
                let stage = &mut stages[idx];
                let mut port = QueuePort {
                    inbox: &mut stage.inbox,
                    outbox: Vec::new(),
                };
                let status = stage.vm.run_with(&mut port)?;
                let outbox = port.outbox;
                stage.status = match status {
                    RunStatus::Halted => StageStatus::Halted,
                    RunStatus::AwaitingInput => StageStatus::Blocked,
                };
                progressed |= stage.vm.step_count() != before;

                let next = if idx + 1 < n {
                    Some(idx + 1)
                } else if self.config.feedback {
                    Some(0)
                } else {
                    None
                };
                if let Some(next) = next {
                    if stages[next].status != StageStatus::Halted {
                        stages[next].inbox.extend(outbox);
                    }
                }
            }

            if !progressed {
                return Err(VmError::Deadlock);
            }
        }
    }

    fn stage_count(&self) -> Result<usize, VmError> {
        if self.phases.is_empty() {
            return Err(VmError::InvalidConfig(
                "pipeline needs at least one phase setting".into(),
            ));
        }
        Ok(self.phases.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum StageStatus {
    Runnable,
    Blocked,
    Halted,
}

struct Stage {
    vm: Vm,
    inbox: VecDeque<i64>,
    status: StageStatus,
}

/// Port for the scheduled pipeline: non-blocking reads from the stage's
/// inbox, writes buffered until the stage yields.
struct QueuePort<'a> {
    inbox: &'a mut VecDeque<i64>,
    outbox: Vec<i64>,
}

impl Port for QueuePort<'_> {
    fn recv(&mut self) -> Result<Option<i64>, VmError> {
        Ok(self.inbox.pop_front())
    }

    fn send(&mut self, value: i64) -> Result<(), VmError> {
        self.outbox.push(value);
        Ok(())
    }
}

/// Port for the threaded pipeline: blocking receive, fire-and-forget send.
struct ChannelPort {
    stage: usize,
    rx: Receiver<i64>,
    tx: Sender<i64>,
}

impl Port for ChannelPort {
    fn recv(&mut self) -> Result<Option<i64>, VmError> {
        self.rx.recv().map(Some).map_err(|_| VmError::ChannelClosed)
    }

    fn send(&mut self, value: i64) -> Result<(), VmError> {
        if self.tx.send(value).is_err() {
            // In a feedback loop the first stage halts before the last
            // stage's final output; that value is still recorded as the
            // stage's last output.
            debug!(stage = self.stage, value, "downstream stage gone, output dropped");
        }
        Ok(())
    }
}

fn run_stage(
    stage: usize,
    program: Arc<Program>,
    config: &VmConfig,
    rx: Receiver<i64>,
    tx: Sender<i64>,
) -> Result<Option<i64>, VmError> {
    debug!(stage, "pipeline stage started");
    let mut vm = Vm::with_config(program, config);
    let mut port = ChannelPort { stage, rx, tx };
    vm.run_with(&mut port)?;
    debug!(stage, steps = vm.step_count(), output = ?vm.last_output(), "pipeline stage halted");
    Ok(vm.last_output())
}

/// The last stage's output, or the most informative failure. A stage that
/// fails closes its channels, so its neighbours report `ChannelClosed`;
/// the root cause is preferred over those.
fn collect_result(results: Vec<Result<Option<i64>, VmError>>) -> Result<i64, VmError> {
    let mut closed = false;
    let mut last = None;
    for result in results {
        match result {
            Ok(output) => last = output,
            Err(VmError::ChannelClosed) => closed = true,
            Err(e) => return Err(e),
        }
    }
    if closed {
        return Err(VmError::ChannelClosed);
    }
    last.ok_or(VmError::NoOutput)
}

/// Try every ordering of `phases` and return the largest final signal with
/// the ordering that produced it. Ties keep the first ordering found.
pub fn max_signal(
    program: &Program,
    phases: &[i64],
    config: &PipelineConfig,
) -> Result<(i64, Vec<i64>), VmError> {
    let program = Arc::new(program.clone());
    let mut best: Option<(i64, Vec<i64>)> = None;
    for order in permutations(phases) {
        let signal = Pipeline::new(Arc::clone(&program), order.clone())
            .with_config(config.clone())
            .run_threaded()?;
        if best.as_ref().map_or(true, |(b, _)| signal > *b) {
            best = Some((signal, order));
        }
    }
    best.ok_or_else(|| VmError::InvalidConfig("no phase settings to permute".into()))
}

/// All orderings of `items`, in lexicographic order of positions.
pub fn permutations(items: &[i64]) -> Vec<Vec<i64>> {
    fn extend(current: &mut Vec<i64>, rest: &mut Vec<i64>, out: &mut Vec<Vec<i64>>) {
        if rest.is_empty() {
            out.push(current.clone());
            return;
        }
        for i in 0..rest.len() {
            let item = rest.remove(i);
            current.push(item);
            extend(current, rest, out);
            current.pop();
            rest.insert(i, item);
        }
    }

    if items.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::new();
    extend(&mut Vec::with_capacity(items.len()), &mut items.to_vec(), &mut out);
    out
}
