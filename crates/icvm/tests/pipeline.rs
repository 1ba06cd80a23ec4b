use intcode_vm::pipeline::permutations;
use intcode_vm::{max_signal, Pipeline, PipelineConfig, Program, VmError};

const SERIES_A: &str = "3,15,3,16,1002,16,10,16,1,16,15,15,4,15,99,0,0";
const SERIES_B: &str =
    "3,23,3,24,1002,24,10,24,1002,23,-1,23,101,5,23,23,1,24,23,23,4,23,99,0,0";
const FEEDBACK: &str = "3,26,1001,26,-4,26,3,27,1002,27,2,27,1,27,26,27,4,27,1001,28,-1,28,\
    1005,28,6,99,0,0,5";

fn program(text: &str) -> Program {
    Program::parse(text).unwrap()
}

#[test]
fn test_series_pipeline() {
    let signal = Pipeline::new(program(SERIES_A), vec![4, 3, 2, 1, 0])
        .run_threaded()
        .unwrap();
    assert_eq!(signal, 43210);

    let signal = Pipeline::new(program(SERIES_B), vec![0, 1, 2, 3, 4])
        .run_threaded()
        .unwrap();
    assert_eq!(signal, 54321);
}

#[test]
fn test_feedback_pipeline() {
    let pipeline = Pipeline::new(program(FEEDBACK), vec![9, 8, 7, 6, 5]).feedback(true);
    assert_eq!(pipeline.run_threaded().unwrap(), 139629729);
}

#[test]
fn test_threaded_and_scheduled_agree() {
    let series = Pipeline::new(program(SERIES_B), vec![0, 1, 2, 3, 4]);
    assert_eq!(series.run_scheduled().unwrap(), series.run_threaded().unwrap());

    let feedback = Pipeline::new(program(FEEDBACK), vec![9, 8, 7, 6, 5]).feedback(true);
    assert_eq!(feedback.run_scheduled().unwrap(), 139629729);
    assert_eq!(
        feedback.run_scheduled().unwrap(),
        feedback.run_threaded().unwrap()
    );
}

#[test]
fn test_max_signal_series() {
    let (signal, order) =
        max_signal(&program(SERIES_A), &[0, 1, 2, 3, 4], &PipelineConfig::default()).unwrap();
    assert_eq!(signal, 43210);
    assert_eq!(order, vec![4, 3, 2, 1, 0]);
}

#[test]
fn test_max_signal_feedback() {
    let config = PipelineConfig {
        feedback: true,
        ..PipelineConfig::default()
    };
    let (signal, order) = max_signal(&program(FEEDBACK), &[5, 6, 7, 8, 9], &config).unwrap();
    assert_eq!(signal, 139629729);
    assert_eq!(order, vec![9, 8, 7, 6, 5]);
}

#[test]
fn test_initial_signal() {
    // Single stage that adds its phase to the incoming signal.
    let config = PipelineConfig {
        initial_signal: 40,
        ..PipelineConfig::default()
    };
    let pipeline = Pipeline::new(program("3,20,3,21,1,20,21,20,4,20,99"), vec![2]).with_config(config);
    assert_eq!(pipeline.run_threaded().unwrap(), 42);
    assert_eq!(pipeline.run_scheduled().unwrap(), 42);
}

#[test]
fn test_permutations() {
    let all = permutations(&[1, 2, 3]);
    assert_eq!(
        all,
        vec![
            vec![1, 2, 3],
            vec![1, 3, 2],
            vec![2, 1, 3],
            vec![2, 3, 1],
            vec![3, 1, 2],
            vec![3, 2, 1],
        ]
    );
    assert_eq!(permutations(&[5, 6, 7, 8, 9]).len(), 120);
    assert!(permutations(&[]).is_empty());
}

#[test]
fn test_empty_phases_rejected() {
    let pipeline = Pipeline::new(program(SERIES_A), Vec::new());
    assert!(matches!(pipeline.run_threaded(), Err(VmError::InvalidConfig(_))));
    assert!(matches!(pipeline.run_scheduled(), Err(VmError::InvalidConfig(_))));
}

#[test]
fn test_scheduled_deadlock() {
    // Wants a third input nobody will ever send.
    let pipeline = Pipeline::new(program("3,0,3,0,3,0,99"), vec![1]);
    assert!(matches!(pipeline.run_scheduled(), Err(VmError::Deadlock)));
}

#[test]
fn test_failing_stage_reports_root_cause() {
    // Stage 0 faults after its inputs; stage 1 then sees a closed channel.
    let pipeline = Pipeline::new(program("3,0,3,0,42"), vec![0, 1]);
    match pipeline.run_threaded() {
        Err(VmError::Decode { ip, .. }) => assert_eq!(ip, 4),
        other => panic!("expected decode fault, got {other:?}"),
    }
}

#[test]
fn test_no_output() {
    let pipeline = Pipeline::new(program("3,0,3,0,99"), vec![1]);
    assert!(matches!(pipeline.run_threaded(), Err(VmError::NoOutput)));
    assert!(matches!(pipeline.run_scheduled(), Err(VmError::NoOutput)));
}
