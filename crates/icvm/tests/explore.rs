use intcode_vm::{Explorer, RunStatus, Visit, Vm, VmError};

/// Reads three digits and prints 1 only for the combination 2, 1, 3.
const LOCK: &str = "3,50,3,51,3,52,1008,50,2,53,1008,51,1,54,1008,52,3,55,2,53,54,56,2,56,55,56,\
    4,56,99";

fn explorer() -> Explorer {
    Explorer::new(Vm::load(LOCK).unwrap()).unwrap()
}

#[test]
fn test_checkpoint_at_first_prompt() {
    let explorer = explorer();
    assert_eq!(explorer.status(), RunStatus::AwaitingInput);
    assert!(explorer.outputs().is_empty());
    assert_eq!(explorer.checkpoint().ip(), 0);
}

#[test]
fn test_try_inputs_leaves_checkpoint_untouched() {
    let explorer = explorer();
    let wrong = explorer.try_inputs(&[1, 1, 1]).unwrap();
    assert_eq!(wrong.outputs, vec![0]);
    assert_eq!(wrong.status, RunStatus::Halted);

    let right = explorer.try_inputs(&[2, 1, 3]).unwrap();
    assert_eq!(right.outputs, vec![1]);

    let partial = explorer.try_inputs(&[2]).unwrap();
    assert_eq!(partial.status, RunStatus::AwaitingInput);
    assert_eq!(partial.vm.ip(), 2);

    assert_eq!(explorer.checkpoint().ip(), 0);
    assert_eq!(explorer.checkpoint().step_count(), 0);
    assert_eq!(explorer.checkpoint().peek(50).unwrap(), 0);
}

#[test]
fn test_search_returns_first_accepted_candidate() {
    let explorer = explorer();
    let mut candidates = Vec::new();
    for a in 1..=3 {
        for b in 1..=3 {
            for c in 1..=3 {
                candidates.push(vec![a, b, c]);
            }
        }
    }
    let (found, fork) = explorer
        .search(candidates, |fork| fork.outputs == [1])
        .unwrap()
        .expect("combination exists");
    assert_eq!(found, vec![2, 1, 3]);
    assert!(fork.vm.is_halted());

    let none = explorer
        .search([[9, 9, 9]], |fork| fork.outputs == [1])
        .unwrap();
    assert!(none.is_none());
}

#[test]
fn test_breadth_first_finds_shortest_path() {
    let explorer = explorer();
    let moves = vec![vec![1], vec![2], vec![3]];
    let mut visited = 0;
    let (path, fork) = explorer
        .breadth_first(&moves, 5, |_, fork| {
            visited += 1;
            if fork.outputs == [1] {
                Visit::Found
            } else {
                Visit::Continue
            }
        })
        .unwrap()
        .expect("lock opens");
    assert_eq!(path, vec![1, 0, 2]);
    assert_eq!(fork.status, RunStatus::Halted);
    // Levels one and two in full, then the children of [0,0], [0,1], [0,2]
    // before [1,0,2] itself.
    assert_eq!(visited, 3 + 9 + 9 + 3);
}

#[test]
fn test_breadth_first_prune_and_depth() {
    let explorer = explorer();
    let moves = vec![vec![1], vec![2], vec![3]];

    // Pruning every first move that is not 2 still finds the combination.
    let (path, _) = explorer
        .breadth_first(&moves, 3, |path, fork| {
            if fork.outputs == [1] {
                Visit::Found
            } else if path[0] != 1 {
                Visit::Prune
            } else {
                Visit::Continue
            }
        })
        .unwrap()
        .expect("lock opens");
    assert_eq!(path, vec![1, 0, 2]);

    let shallow = explorer
        .breadth_first(&moves, 2, |_, fork| {
            if fork.outputs == [1] {
                Visit::Found
            } else {
                Visit::Continue
            }
        })
        .unwrap();
    assert!(shallow.is_none());
}

#[test]
fn test_advance_commits_inputs() {
    let mut explorer = explorer();
    assert!(explorer.advance(&[2]).unwrap().is_empty());
    assert_eq!(explorer.checkpoint().peek(50).unwrap(), 2);

    assert_eq!(explorer.try_inputs(&[1, 3]).unwrap().outputs, vec![1]);
    assert_eq!(explorer.try_inputs(&[3, 3]).unwrap().outputs, vec![0]);

    assert_eq!(explorer.advance(&[1, 3]).unwrap(), &[1]);
    assert_eq!(explorer.status(), RunStatus::Halted);
    assert!(matches!(explorer.advance(&[1]), Err(VmError::Halted)));
}
