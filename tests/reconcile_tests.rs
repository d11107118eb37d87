//! Reconciliation run tests: check mode, failures and the read-only states
//!
//! These go through the module registry the way the CLI does, with a
//! [`SimulatedDevice`] standing in for the router.

mod common;

use common::*;
use netres::engine::{plan, MergePolicy, PatternTable};
use netres::error::{Error, Phase};
use netres::modules::network::ios;
use netres::modules::{ModuleContext, ModuleError, ModuleRegistry};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

const VLANS: &str = "\
vlan 10
 name users
vlan 20
 name voice
";

// ============================================================================
// Check mode
// ============================================================================

#[test]
fn test_check_mode_sends_nothing() {
    let registry = ModuleRegistry::with_builtins();
    let device = Arc::new(SimulatedDevice::new(VLANS));
    let context = device.clone().into_context().with_check_mode(true);

    let output = registry
        .execute(
            "ios_vlans",
            &params("merged", Some(json!([{"vlan_id": 30, "name": "lab"}]))),
            &context,
        )
        .unwrap();

    assert!(output.changed);
    assert_eq!(output.commands(), vec!["vlan 30", "name lab"]);
    assert!(output.msg.contains("would send"));
    assert!(device.sent().is_empty());
    assert_eq!(device.running(), "vlan 10\n name users\nvlan 20\n name voice\n");
    // predicted facts, not re-gathered ones
    assert_eq!(
        output.data["after"],
        json!([
            {"vlan_id": 10, "name": "users"},
            {"vlan_id": 20, "name": "voice"},
            {"vlan_id": 30, "name": "lab"}
        ])
    );
}

#[test]
fn test_check_mode_prediction_matches_real_run() {
    let registry = ModuleRegistry::with_builtins();
    let device = Arc::new(SimulatedDevice::new(VLANS));
    let run = params(
        "overridden",
        Some(json!([{"vlan_id": 20, "name": "voice"}, {"vlan_id": 40, "mtu": 9000}])),
    );

    let predicted = registry
        .execute("ios_vlans", &run, &device.clone().into_context().with_check_mode(true))
        .unwrap();
    let applied = registry
        .execute("ios_vlans", &run, &device.clone().into_context())
        .unwrap();

    assert_eq!(predicted.commands(), applied.commands());
    assert_eq!(predicted.data["after"], applied.data["after"]);
}

#[test]
fn test_diff_mode_attaches_fact_diff() {
    let registry = ModuleRegistry::with_builtins();
    let device = Arc::new(SimulatedDevice::new(VLANS));
    let context = device
        .clone()
        .into_context()
        .with_check_mode(true)
        .with_diff_mode(true);

    let output = registry
        .execute(
            "ios_vlans",
            &params("deleted", Some(json!([{"vlan_id": 20}]))),
            &context,
        )
        .unwrap();

    let diff = output.diff.expect("diff requested");
    assert!(diff.before.contains("voice"));
    assert!(!diff.after.contains("voice"));
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_rejected_commands_fail_in_apply_phase() {
    let registry = ModuleRegistry::with_builtins();
    let device = Arc::new(SimulatedDevice::new(VLANS).rejecting("name"));

    let err = registry
        .execute(
            "ios_vlans",
            &params("merged", Some(json!([{"vlan_id": 10, "name": "staff"}]))),
            &device.clone().into_context(),
        )
        .unwrap_err();

    assert_eq!(err.exit_code(), 3);
    match err {
        ModuleError::Reconcile(e) => {
            assert_eq!(e.phase, Phase::Apply);
            assert_eq!(e.commands(), ["vlan 10".to_string(), "name staff".to_string()]);
            assert!(e.to_string().contains("Invalid input"));
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(device.sent().is_empty());
    assert!(device.running().contains("name users"));
}

#[test]
fn test_mutating_state_requires_device() {
    let registry = ModuleRegistry::with_builtins();
    let err = registry
        .execute(
            "ios_vlans",
            &params("merged", Some(json!([{"vlan_id": 10}]))),
            &ModuleContext::new(),
        )
        .unwrap_err();

    assert_eq!(err.exit_code(), 4);
    match err {
        ModuleError::Reconcile(e) => {
            assert_eq!(e.phase, Phase::LoadFacts);
            assert!(matches!(e.source, Error::InvalidInput(_)));
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_replaced_without_config_is_invalid() {
    let registry = ModuleRegistry::with_builtins();
    let device = Arc::new(SimulatedDevice::new(VLANS));
    let err = registry
        .execute("ios_vlans", &params("replaced", None), &device.into_context())
        .unwrap_err();
    assert_eq!(err.exit_code(), 4);
}

#[test]
fn test_unknown_state_and_resource() {
    let registry = ModuleRegistry::with_builtins();
    let err = registry
        .execute("ios_vlans", &params("absent", None), &ModuleContext::new())
        .unwrap_err();
    assert!(matches!(err, ModuleError::Engine(Error::UnknownState(_))));
    assert_eq!(err.exit_code(), 4);

    let err = registry
        .execute("ios_ntp", &params("gathered", None), &ModuleContext::new())
        .unwrap_err();
    assert!(matches!(err, ModuleError::NotFound(_)));
}

#[test]
fn test_key_collision_in_want_is_rejected() {
    let table = PatternTable::new(ios::vlans::table_spec()).unwrap();
    let want = facts(json!({"vlans": [
        {"vlan_id": 10, "name": "a"},
        {"vlan_id": 10, "name": "b"}
    ]}));
    let err = plan(&want, &Default::default(), MergePolicy::Merged, &table).unwrap_err();
    assert!(matches!(err, Error::KeyCollision { .. }));
    assert_eq!(err.exit_code(), 4);
}

#[test]
fn test_element_without_natural_key_is_rejected() {
    let table = PatternTable::new(ios::bgp_global::table_spec()).unwrap();
    let want = facts(json!({"as_number": 65000, "neighbor": [{"remote_as": 20}]}));
    let err = plan(&want, &Default::default(), MergePolicy::Merged, &table).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(ref message) if message.contains("neighbor")));
    assert_eq!(err.exit_code(), 4);
}

// ============================================================================
// Read-only states
// ============================================================================

#[test]
fn test_gathered_reads_device() {
    let registry = ModuleRegistry::with_builtins();
    let device = Arc::new(SimulatedDevice::new(&format!(
        "{}ip route 0.0.0.0 0.0.0.0 192.0.2.1\n",
        VLANS
    )));

    let output = registry
        .execute("ios_vlans", &params("gathered", None), &device.clone().into_context())
        .unwrap();

    assert!(!output.changed);
    assert!(!output.data.contains_key("commands"));
    assert_eq!(
        output.data["gathered"],
        json!([{"vlan_id": 10, "name": "users"}, {"vlan_id": 20, "name": "voice"}])
    );
    assert!(device.sent().is_empty());
}

#[test]
fn test_parsed_needs_no_device() {
    let registry = ModuleRegistry::with_builtins();
    let mut run = params("parsed", None);
    run.insert(
        "running_config".to_string(),
        json!("Building configuration...\n!\nsnmp-server contact noc\nsnmp-server location dc1\nend\n"),
    );

    let output = registry
        .execute("ios_snmp_server", &run, &ModuleContext::new())
        .unwrap();
    assert_eq!(
        output.data["parsed"],
        json!({"contact": "noc", "location": "dc1"})
    );
}

#[test]
fn test_rendered_then_parsed_round_trip() {
    let registry = ModuleRegistry::with_builtins();
    let config = json!({
        "as_number": 65000,
        "bgp": {"router_id": "10.0.0.1", "log_neighbor_changes": true},
        "neighbor": [{"address": "192.0.2.1", "remote_as": 10, "description": "transit"}]
    });

    let rendered = registry
        .execute(
            "ios_bgp_global",
            &params("rendered", Some(config.clone())),
            &ModuleContext::new(),
        )
        .unwrap();
    let lines: Vec<String> = serde_json::from_value(rendered.data["rendered"].clone()).unwrap();
    assert_eq!(lines[0], "router bgp 65000");

    let mut run = params("parsed", None);
    run.insert("running_config".to_string(), json!(lines.join("\n")));
    let parsed = registry
        .execute("ios_bgp_global", &run, &ModuleContext::new())
        .unwrap();
    assert_eq!(parsed.data["parsed"], config);
}
