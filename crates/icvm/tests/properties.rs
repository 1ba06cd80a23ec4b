//! Engine invariants under property testing:
//! 1. Determinism: identical program and inputs give identical outputs
//! 2. Chunking: feeding input in pieces equals feeding it at once
//! 3. Fork independence: a clone never observes the original's progress
//! 4. Snapshot resume: a JSON snapshot continues exactly where it stopped

use intcode_vm::{RunStatus, Snapshot, Vm};
use proptest::prelude::*;

/// Emits the running sum after every input, forever.
const RUNNING_SUM: &str = "3,100,1,100,101,101,4,101,1105,1,0";

fn prefix_sums(values: &[i64]) -> Vec<i64> {
    values
        .iter()
        .scan(0i64, |acc, &v| {
            *acc += v;
            Some(*acc)
        })
        .collect()
}

fn fresh() -> Vm {
    Vm::load(RUNNING_SUM).unwrap()
}

proptest! {
    #[test]
    fn prop_running_sum(inputs in prop::collection::vec(-1_000_000i64..1_000_000, 0..40)) {
        let mut vm = fresh();
        let outcome = vm.run(&inputs).unwrap();
        prop_assert_eq!(outcome.status, RunStatus::AwaitingInput);
        prop_assert_eq!(outcome.outputs, prefix_sums(&inputs));
    }

    #[test]
    fn prop_deterministic(inputs in prop::collection::vec(any::<i32>().prop_map(i64::from), 1..30)) {
        let mut a = fresh();
        let mut b = fresh();
        prop_assert_eq!(a.run(&inputs).unwrap(), b.run(&inputs).unwrap());
        prop_assert_eq!(a.memory(), b.memory());
        prop_assert_eq!(a.step_count(), b.step_count());
    }

    #[test]
    fn prop_chunked_input(
        inputs in prop::collection::vec(-1_000i64..1_000, 1..30),
        split in 0usize..30,
    ) {
        let split = split.min(inputs.len());
        let mut whole = fresh();
        let expected = whole.run(&inputs).unwrap().outputs;

        let mut chunked = fresh();
        let mut outputs = chunked.run(&inputs[..split]).unwrap().outputs;
        outputs.extend(chunked.run(&inputs[split..]).unwrap().outputs);

        prop_assert_eq!(outputs, expected);
        prop_assert_eq!(chunked.memory(), whole.memory());
    }

    #[test]
    fn prop_fork_independent(
        prefix in prop::collection::vec(-1_000i64..1_000, 0..10),
        left in -1_000i64..1_000,
        right in -1_000i64..1_000,
    ) {
        let mut original = fresh();
        original.run(&prefix).unwrap();
        let before = original.memory().clone();
        let mut fork = original.clone();

        let fork_out = fork.run(&[left]).unwrap().outputs;
        prop_assert_eq!(original.memory(), &before);

        let original_out = original.run(&[right]).unwrap().outputs;
        let base: i64 = prefix.iter().sum();
        prop_assert_eq!(fork_out, vec![base + left]);
        prop_assert_eq!(original_out, vec![base + right]);
    }

    #[test]
    fn prop_snapshot_resume(
        prefix in prop::collection::vec(-1_000i64..1_000, 0..10),
        rest in prop::collection::vec(-1_000i64..1_000, 0..10),
    ) {
        let mut vm = fresh();
        vm.run(&prefix).unwrap();
        let json = vm.snapshot().to_json().unwrap();

        let mut resumed = Vm::from_snapshot(&Snapshot::from_json(&json).unwrap());
        prop_assert_eq!(resumed.run(&rest).unwrap(), vm.run(&rest).unwrap());
        prop_assert_eq!(resumed.step_count(), vm.step_count());
    }
}
