use intcode_vm::{Network, NetworkConfig, Program, VmError};

/// Node 1 sends (255, 5, 7) at boot. Every node forwards whatever packet it
/// receives to the NAT unchanged.
const RELAY: &str = "3,100,1008,100,1,103,1006,103,15,104,255,104,5,104,7,3,101,1008,101,-1,\
    103,1005,103,15,3,102,104,255,4,101,4,102,1105,1,15,99";

/// Node 0 sends (255, 0, 0) at boot and forwards every packet it receives
/// to node 1. Node 1 answers each packet with (255, x, min(y + 1, 3)), so
/// the NAT sees Y climb 0, 1, 2, 3 before it settles.
const COUNTER: &str = "3,200,1006,200,8,1105,1,14,104,255,104,0,104,0,3,201,1008,201,-1,203,\
    1005,203,14,3,202,1006,200,45,1007,202,3,203,1,202,203,202,104,255,4,201,4,202,1105,1,14,\
    104,1,4,201,4,202,1105,1,14";

/// Polls forever and never sends anything.
const SILENT: &str = "3,100,3,101,1105,1,2";

fn network(text: &str, nodes: usize) -> Network {
    let config = NetworkConfig {
        nodes,
        ..NetworkConfig::default()
    };
    Network::new(Program::parse(text).unwrap()).with_config(config)
}

#[test]
fn test_nat_repeats_relayed_packet() {
    let outcome = network(RELAY, 4).run().unwrap();
    assert_eq!(outcome.first_nat_y, 7);
    assert_eq!(outcome.repeated_y, 7);
    assert_eq!(outcome.injections, 2);
    assert_eq!(outcome.packets_routed, 0);
}

#[test]
fn test_full_size_mesh() {
    let net = Network::new(Program::parse(RELAY).unwrap());
    assert_eq!(net.config().nodes, 50);
    let outcome = net.run().unwrap();
    assert_eq!((outcome.first_nat_y, outcome.repeated_y), (7, 7));
}

#[test]
fn test_nat_waits_for_consecutive_repeat() {
    for nodes in [2, 50] {
        let outcome = network(COUNTER, nodes).run().unwrap();
        assert_eq!(outcome.first_nat_y, 0, "{nodes} nodes");
        assert_eq!(outcome.repeated_y, 3, "{nodes} nodes");
        assert_eq!(outcome.injections, 5, "{nodes} nodes");
        assert_eq!(outcome.packets_routed, 5, "{nodes} nodes");
    }
}

#[test]
fn test_silent_network_deadlocks() {
    assert!(matches!(network(SILENT, 3).run(), Err(VmError::Deadlock)));
}

#[test]
fn test_all_nodes_halting_deadlocks() {
    assert!(matches!(network("3,100,99", 3).run(), Err(VmError::Deadlock)));
}

#[test]
fn test_node_failure_is_reported() {
    match network("3,100,42", 3).run() {
        Err(VmError::NodeFailed { message, .. }) => {
            assert!(message.contains("unknown opcode 42"), "{message}");
        }
        other => panic!("expected NodeFailed, got {other:?}"),
    }
}

#[test]
fn test_config_validation() {
    let err = network(RELAY, 0).run().unwrap_err();
    assert!(matches!(err, VmError::InvalidConfig(_)));

    let config = NetworkConfig {
        nodes: 4,
        nat_address: 3,
        ..NetworkConfig::default()
    };
    assert!(config.validate().is_err());

    let config = NetworkConfig {
        idle_polls: 0,
        ..NetworkConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_config_from_json() {
    let config = NetworkConfig::from_json(r#"{"nodes": 4, "vm": {"max_steps": 5000}}"#).unwrap();
    assert_eq!(config.nodes, 4);
    assert_eq!(config.nat_address, 255);
    assert_eq!(config.idle_polls, 2);
    assert_eq!(config.vm.max_steps, 5000);

    assert!(NetworkConfig::from_json(r#"{"nodes": 300, "nat_address": 255}"#).is_err());
    assert!(NetworkConfig::from_json("not json").is_err());
}
