use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

use intcode_bytecode::disasm::disassemble;
use intcode_bytecode::Program;
use intcode_vm::ascii;
use intcode_vm::config::DEFAULT_MAX_STEPS;
use intcode_vm::{
    max_signal, Network, NetworkConfig, Pipeline, PipelineConfig, RunOutcome, RunStatus,
    Snapshot, Vm, VmConfig,
};

#[derive(Parser)]
#[command(name = "intcode", about = "Intcode virtual machine")]
struct Cli {
    /// Log debug events (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a program until it halts or runs out of input.
    Run {
        /// Program file (comma-separated text, or a .json image)
        file: PathBuf,
        /// Input values (comma-separated).
        #[arg(short, long, value_delimiter = ',', allow_negative_numbers = true)]
        input: Vec<i64>,
        /// Text input lines, each sent as ASCII followed by a newline.
        #[arg(short, long)]
        line: Vec<String>,
        /// Print output as ASCII text.
        #[arg(long)]
        ascii: bool,
        /// Maximum execution steps.
        #[arg(long, default_value_t = DEFAULT_MAX_STEPS)]
        max_steps: u64,
        /// Patch memory before running, as address=value. Repeatable.
        #[arg(long, value_parser = parse_poke)]
        poke: Vec<(i64, i64)>,
    },
    /// Run with per-instruction tracing enabled.
    Trace {
        /// Program file
        file: PathBuf,
        /// Input values (comma-separated).
        #[arg(short, long, value_delimiter = ',', allow_negative_numbers = true)]
        input: Vec<i64>,
    },
    /// Disassemble a program.
    Disasm {
        /// Program file
        file: PathBuf,
    },
    /// Chain instances with phase settings and report the final signal.
    Amplify {
        /// Program file
        file: PathBuf,
        /// Phase settings (comma-separated).
        #[arg(long, value_delimiter = ',', allow_negative_numbers = true, required = true)]
        phases: Vec<i64>,
        /// Loop the last stage's output back into the first.
        #[arg(long)]
        feedback: bool,
        /// Run the phases in the given order instead of searching all orderings.
        #[arg(long)]
        fixed: bool,
        /// Signal fed to the first stage.
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        signal: i64,
    },
    /// Boot a mesh network with a NAT and run it to completion.
    Network {
        /// Program file
        file: PathBuf,
        /// Number of nodes.
        #[arg(long)]
        nodes: Option<usize>,
        /// Network configuration file (JSON).
        #[arg(long)]
        config: Option<PathBuf>,
        /// Print the outcome as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Run to the first unsatisfied input request and save the VM state.
    Snapshot {
        /// Program file
        file: PathBuf,
        /// Input values (comma-separated).
        #[arg(short, long, value_delimiter = ',', allow_negative_numbers = true)]
        input: Vec<i64>,
        /// Snapshot output file (JSON).
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Continue a saved VM.
    Resume {
        /// Snapshot file (JSON)
        snapshot: PathBuf,
        /// Input values (comma-separated).
        #[arg(short, long, value_delimiter = ',', allow_negative_numbers = true)]
        input: Vec<i64>,
        /// Save the resulting state here.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Maximum execution steps, counted from the original start.
        #[arg(long, default_value_t = DEFAULT_MAX_STEPS)]
        max_steps: u64,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

/// `RUST_LOG` wins; otherwise warnings plus VM info events, or everything
/// at debug with `-v`.
fn init_logging(verbose: bool) {
    let default = if verbose {
        "debug"
    } else {
        "warn,intcode_vm=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Run {
            file,
            input,
            line,
            ascii: as_text,
            max_steps,
            poke,
        } => {
            let program = load_program(&file)?;
            let config = VmConfig {
                max_steps,
                ..VmConfig::default()
            };
            let mut vm = Vm::with_config(program, &config);
            for (address, value) in poke {
                vm.poke(address, value)?;
            }

            let mut inputs = input;
            for l in &line {
                inputs.extend(ascii::encode_line(l));
            }
            let outcome = vm.run(&inputs)?;
            if as_text {
                let (text, values) = ascii::decode(&outcome.outputs);
                print!("{text}");
                for v in values {
                    println!("{v}");
                }
            } else {
                print_outputs(&outcome);
            }
            print_status(&vm, outcome.status);
        }
        Command::Trace { file, input } => {
            let program = load_program(&file)?;
            let config = VmConfig {
                trace: true,
                ..VmConfig::default()
            };
            let mut vm = Vm::with_config(program, &config);

            match vm.run(&input) {
                Ok(outcome) => {
                    print_outputs(&outcome);
                    print_status(&vm, outcome.status);
                }
                Err(e) => eprintln!("runtime error: {e}"),
            }

            println!("\n--- Trace ({} steps) ---", vm.step_count());
            for entry in &vm.trace {
                println!("  {entry}");
            }
        }
        Command::Disasm { file } => {
            let program = load_program(&file)?;
            for line in disassemble(&program) {
                println!("{line}");
            }
        }
        Command::Amplify {
            file,
            phases,
            feedback,
            fixed,
            signal,
        } => {
            let program = load_program(&file)?;
            let config = PipelineConfig {
                feedback,
                initial_signal: signal,
                ..PipelineConfig::default()
            };
            if fixed {
                let result = Pipeline::new(program, phases)
                    .with_config(config)
                    .run_threaded()?;
                println!("signal: {result}");
            } else {
                let (best, order) = max_signal(&program, &phases, &config)?;
                println!("max signal: {best}");
                println!("phases: {}", join(&order));
            }
        }
        Command::Network {
            file,
            nodes,
            config,
            json,
        } => {
            let program = load_program(&file)?;
            let mut net_config = match config {
                Some(path) => NetworkConfig::from_json(&fs::read_to_string(&path)?)?,
                None => NetworkConfig::default(),
            };
            if let Some(nodes) = nodes {
                net_config.nodes = nodes;
            }

            let outcome = Network::new(program).with_config(net_config).run()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("first nat y: {}", outcome.first_nat_y);
                println!("repeated y: {}", outcome.repeated_y);
                println!("injections: {}", outcome.injections);
                println!("packets routed: {}", outcome.packets_routed);
            }
        }
        Command::Snapshot {
            file,
            input,
            output,
        } => {
            let program = load_program(&file)?;
            let mut vm = Vm::new(program);
            let outcome = vm.run(&input)?;
            print_outputs(&outcome);
            save_snapshot(&vm, &output)?;
            print_status(&vm, outcome.status);
        }
        Command::Resume {
            snapshot,
            input,
            output,
            max_steps,
        } => {
            let json = fs::read_to_string(&snapshot)?;
            let snapshot = Snapshot::from_json(&json)?;
            let config = VmConfig {
                max_steps,
                max_memory: snapshot.memory.limit(),
                ..VmConfig::default()
            };
            let mut vm = Vm::from_snapshot_with_config(&snapshot, &config);
            let outcome = vm.run(&input)?;
            print_outputs(&outcome);
            if let Some(path) = output {
                save_snapshot(&vm, &path)?;
            }
            print_status(&vm, outcome.status);
        }
    }
    Ok(())
}

/// `.json` files hold a serialized image; anything else is program text.
fn load_program(path: &Path) -> Result<Program, Box<dyn std::error::Error>> {
    let program = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => Program::from_json(&fs::read_to_string(path)?)?,
        _ => Program::parse(&fs::read_to_string(path)?)?,
    };
    debug!(path = %path.display(), cells = program.len(), "program loaded");
    Ok(program)
}

fn save_snapshot(vm: &Vm, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    fs::write(path, vm.snapshot().to_json()?)?;
    println!("snapshot written to {} (ip {})", path.display(), vm.ip());
    Ok(())
}

fn parse_poke(s: &str) -> Result<(i64, i64), String> {
    let (address, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected address=value, got '{s}'"))?;
    let address = address
        .trim()
        .parse()
        .map_err(|e| format!("bad address '{address}': {e}"))?;
    let value = value
        .trim()
        .parse()
        .map_err(|e| format!("bad value '{value}': {e}"))?;
    Ok((address, value))
}

fn print_outputs(outcome: &RunOutcome) {
    if !outcome.outputs.is_empty() {
        println!("output: {}", join(&outcome.outputs));
    }
}

fn print_status(vm: &Vm, status: RunStatus) {
    match status {
        RunStatus::Halted => println!("halted after {} steps", vm.step_count()),
        RunStatus::AwaitingInput => println!(
            "awaiting input at ip {} after {} steps",
            vm.ip(),
            vm.step_count()
        ),
    }
}

fn join(values: &[i64]) -> String {
    values
        .iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
