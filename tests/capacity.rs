//! Tests of the rule-based capacity estimate for each junction control type.

mod common;

use assert_approx_eq::assert_approx_eq;
use serde_json::{json, Value};
use std::collections::HashMap;
use traffic_calib::network::{ControlType, NetworkDocument};
use traffic_calib::{estimate_capacity, CapacityParams, CapacityTable, Error, NetworkModel};

/// A junction `X` of the given type fed by one edge per entry of `priorities`,
/// each with `lanes` lanes named `in{i}_{j}`.
fn star(kind: &str, priorities: &[i32], lanes: usize, program: Option<Value>) -> NetworkDocument {
    let mut nodes = vec![json!({ "id": "X", "type": kind, "program": program })];
    let mut edges = vec![];
    for (i, priority) in priorities.iter().enumerate() {
        nodes.push(json!({ "id": format!("s{i}"), "type": "dead_end" }));
        let lanes = (0..lanes)
            .map(|j| json!({ "id": format!("in{i}_{j}"), "length": 100.0 }))
            .collect::<Vec<_>>();
        edges.push(json!({
            "id": format!("in{i}"),
            "from": format!("s{i}"),
            "to": "X",
            "priority": priority,
            "lanes": lanes,
        }));
    }
    serde_json::from_value(json!({ "nodes": nodes, "edges": edges })).unwrap()
}

fn estimate(doc: &NetworkDocument) -> traffic_calib::Result<traffic_calib::CapacityEstimate> {
    let network = NetworkModel::from_document(doc)?;
    estimate_capacity(&network, &CapacityParams::default())
}

/// Test that a 3-way all-way stop splits the stop sign capacity evenly.
#[test]
fn allway_stop_splits_evenly() {
    let capacities = estimate(&star("allway_stop", &[1, 1, 2], 2, None)).unwrap();
    assert_eq!(capacities.len(), 6);
    for (_, lane) in capacities.iter_sorted() {
        assert_approx_eq!(lane.capacity, 240.0);
        assert_eq!(lane.control, ControlType::AllwayStop);
    }
}

#[test]
fn priority_coefficients_follow_rank() {
    let capacities = estimate(&star("priority", &[1, 3, 2], 1, None)).unwrap();
    assert_approx_eq!(capacities.capacity("in0_0").unwrap(), 1800.0 * 0.6);
    assert_approx_eq!(capacities.capacity("in2_0").unwrap(), 1800.0 * 0.3);
    assert_approx_eq!(capacities.capacity("in1_0").unwrap(), 1800.0 * 0.1);

    let capacities = estimate(&star("priority", &[-1, 4], 1, None)).unwrap();
    assert_approx_eq!(capacities.capacity("in0_0").unwrap(), 1800.0 * 0.8);
    assert_approx_eq!(capacities.capacity("in1_0").unwrap(), 1800.0 * 0.2);

    let capacities = estimate(&star("priority", &[2, 4], 1, None)).unwrap();
    assert_approx_eq!(capacities.capacity("in0_0").unwrap(), 1800.0 * 0.6);
    assert_approx_eq!(capacities.capacity("in1_0").unwrap(), 1800.0 * 0.4);

    let capacities = estimate(&star("priority", &[3, 3, 3], 2, None)).unwrap();
    assert_approx_eq!(capacities.capacity("in2_1").unwrap(), 450.0);
}

#[test]
fn too_many_priority_ranks() {
    let err = estimate(&star("priority", &[1, 2, 3, 4, 5], 1, None)).unwrap_err();
    assert!(matches!(err, Error::Configuration { ref entity, .. } if entity == "X"));
}

#[test]
fn priority_without_approaches() {
    let err = estimate(&star("priority", &[], 1, None)).unwrap_err();
    assert!(matches!(err, Error::Configuration { ref entity, .. } if entity == "X"));
}

#[test]
fn priority_stop_major_and_minor() {
    let capacities = estimate(&star("priority_stop", &[5, 5, 1, 2], 1, None)).unwrap();
    // Two minor approaches share the stop sign capacity.
    assert_approx_eq!(capacities.capacity("in2_0").unwrap(), 360.0);
    assert_approx_eq!(capacities.capacity("in3_0").unwrap(), 360.0);
    assert_approx_eq!(capacities.capacity("in0_0").unwrap(), 900.0);
    assert_approx_eq!(capacities.capacity("in1_0").unwrap(), 900.0);
}

#[test]
fn priority_stop_without_minor_roads() {
    let capacities = estimate(&star("priority_stop", &[3, 3, 3, 3], 1, None)).unwrap();
    for (_, lane) in capacities.iter_sorted() {
        assert_approx_eq!(lane.capacity, 180.0);
    }
}

#[test]
fn dead_end_keeps_default_capacity() {
    let capacities = estimate(&star("dead_end", &[0], 3, None)).unwrap();
    assert_eq!(capacities.len(), 3);
    assert_approx_eq!(capacities.capacity("in0_2").unwrap(), 1800.0);
}

#[test]
fn unknown_control_type() {
    let err = estimate(&star("roundabout", &[0], 1, None)).unwrap_err();
    assert!(matches!(err, Error::Configuration { ref entity, .. } if entity == "X"));
}

#[test]
fn traffic_light_without_program() {
    let err = estimate(&star("traffic_light", &[0], 1, None)).unwrap_err();
    assert!(matches!(err, Error::Configuration { ref entity, .. } if entity == "X"));
}

#[test]
fn malformed_signal_program() {
    let program = json!({ "phases": [
        { "duration": 30.0, "state": "Gr" },
        { "duration": 30.0, "state": "rGr" }
    ]});
    let err = estimate(&star("traffic_light", &[0], 1, Some(program))).unwrap_err();
    assert!(matches!(err, Error::Configuration { .. }));
}

/// Test that a lane feeding two signalized movements takes the longer green.
#[test]
fn signal_lane_takes_largest_green_share() {
    let doc = serde_json::from_value(json!({
        "nodes": [
            { "id": "s0", "type": "dead_end" },
            {
                "id": "X", "type": "traffic_light",
                "program": { "phases": [
                    { "duration": 40.0, "state": "Gr" },
                    { "duration": 20.0, "state": "rG" }
                ]}
            },
            { "id": "o0", "type": "dead_end" },
            { "id": "o1", "type": "dead_end" }
        ],
        "edges": [
            { "id": "in0", "from": "s0", "to": "X", "lanes": [{ "id": "in0_0", "length": 100.0 }] },
            { "id": "out0", "from": "X", "to": "o0", "lanes": [{ "id": "out0_0", "length": 100.0 }] },
            { "id": "out1", "from": "X", "to": "o1", "lanes": [{ "id": "out1_0", "length": 100.0 }] }
        ],
        "connections": [
            { "from": "in0_0", "to": "out0_0", "linkIndex": 1 },
            { "from": "in0_0", "to": "out1_0", "linkIndex": 0 }
        ]
    }))
    .unwrap();
    let capacities = estimate(&doc).unwrap();
    assert_approx_eq!(capacities.capacity("in0_0").unwrap(), 1800.0 * 2.0 / 3.0);
    assert_eq!(capacities.get("in0_0").unwrap().control, ControlType::TrafficLight);
}

/// Test that each approach of the diamond's signal gets half of the cycle.
#[test]
fn diamond_signal_halves_capacity() {
    let network = common::diamond();
    let capacities = estimate_capacity(&network, &CapacityParams::default()).unwrap();
    assert_approx_eq!(capacities.capacity("BD_0").unwrap(), 900.0);
    assert_approx_eq!(capacities.capacity("CD_0").unwrap(), 900.0);
    assert_approx_eq!(capacities.capacity("AB_0").unwrap(), 450.0);
    assert_eq!(
        capacities.get("BD_0").unwrap().control,
        ControlType::TrafficLight
    );
    assert!(capacities.iter_sorted().all(|(_, lane)| lane.capacity >= 0.0));
}

#[test]
fn table_overrides_estimate() {
    let network = common::diamond();
    let estimate = estimate_capacity(&network, &CapacityParams::default()).unwrap();
    let mut table = CapacityTable::from_estimate(&estimate);
    assert_eq!(table.entries().len(), 5);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("capacity.json");
    table.set_observed(&HashMap::from([("AB_0".to_string(), 620.0)]));
    table.save(&path).unwrap();

    let mut entries = CapacityTable::load(&path).unwrap().entries().to_vec();
    assert_eq!(entries[0].lane_id, "AB_0");
    assert_eq!(entries[0].observed_volume, Some(620.0));
    entries[0].manual_adjustment = 2.0;
    entries[1].capacity = None;
    entries[1].weight = 3.0;
    let table = CapacityTable::new(entries);

    let lanes = ["AB_0", "AC_0", "XX_0"].map(String::from);
    let merged = table.merge(&estimate, &lanes);
    assert_approx_eq!(merged[0].capacity, 900.0);
    assert_approx_eq!(merged[1].capacity, 450.0);
    assert_approx_eq!(merged[1].weight, 3.0);
    assert_eq!(merged[2].capacity, 0.0);
}
