//! Tests of the lane-by-route incidence matrix.

mod common;

use assert_approx_eq::assert_approx_eq;
use serde_json::json;
use traffic_calib::{natural_cmp, Error, IncidenceMatrix, NetworkModel, Route};

fn route(id: &str, edges: &[&str]) -> Route {
    Route {
        id: id.to_string(),
        edges: edges.iter().map(|e| e.to_string()).collect(),
    }
}

/// Builds a network from `(edge, from, to, lane count)` and `(from lane, to lane)` lists.
fn network(edges: &[(&str, &str, &str, usize)], connections: &[(&str, &str)]) -> NetworkModel {
    let mut nodes = edges
        .iter()
        .flat_map(|(_, from, to, _)| [*from, *to])
        .collect::<Vec<_>>();
    nodes.sort();
    nodes.dedup();
    let doc = json!({
        "nodes": nodes
            .iter()
            .map(|id| json!({ "id": id, "type": "priority" }))
            .collect::<Vec<_>>(),
        "edges": edges
            .iter()
            .map(|(id, from, to, lanes)| json!({
                "id": id,
                "from": from,
                "to": to,
                "lanes": (0..*lanes)
                    .map(|i| json!({ "id": format!("{id}_{i}"), "length": 50.0 }))
                    .collect::<Vec<_>>(),
            }))
            .collect::<Vec<_>>(),
        "connections": connections
            .iter()
            .map(|(from, to)| json!({ "from": from, "to": to }))
            .collect::<Vec<_>>(),
    });
    NetworkModel::from_document(&serde_json::from_value(doc).unwrap()).unwrap()
}

/// Test that a single-lane chain carries the whole route on every edge.
#[test]
fn straight_route_has_unit_weights() {
    let network = network(
        &[
            ("e1", "n0", "n1", 1),
            ("e2", "n1", "n2", 1),
            ("e3", "n2", "n3", 1),
            ("side", "n3", "n0", 1),
        ],
        &[("e1_0", "e2_0"), ("e2_0", "e3_0"), ("e3_0", "side_0")],
    );
    let incidence = IncidenceMatrix::build(&network, &[route("r_0", &["e1", "e2", "e3"])]).unwrap();

    assert_eq!(incidence.get("e1_0", "r_0"), Some(1.0));
    assert_eq!(incidence.get("e2_0", "r_0"), Some(1.0));
    assert_eq!(incidence.get("e3_0", "r_0"), Some(1.0));
    assert_eq!(incidence.get("side_0", "r_0"), Some(0.0));
}

#[test]
fn lanes_split_by_connections() {
    let network = network(
        &[("a", "n0", "n1", 2), ("b", "n1", "n2", 1), ("c", "n2", "n3", 2)],
        &[("a_0", "b_0"), ("b_0", "c_0"), ("b_0", "c_1")],
    );
    let incidence = IncidenceMatrix::build(&network, &[route("r_0", &["a", "b", "c"])]).unwrap();

    assert_eq!(incidence.get("a_0", "r_0"), Some(1.0));
    assert_eq!(incidence.get("a_1", "r_0"), Some(0.0));
    assert_eq!(incidence.get("b_0", "r_0"), Some(1.0));
    assert_approx_eq!(incidence.get("c_0", "r_0").unwrap(), 0.5);
    assert_approx_eq!(incidence.get("c_1", "r_0").unwrap(), 0.5);
    assert!(incidence.values().iter().all(|v| (0.0..=1.0).contains(v)));
}

#[test]
fn lanes_and_routes_sort_naturally() {
    let mut ids = vec!["e1_9", "e1_10", "e1_2"];
    ids.sort_by(|a, b| natural_cmp(a, b));
    assert_eq!(ids, ["e1_2", "e1_9", "e1_10"]);

    let network = network(&[("e1", "n0", "n1", 12)], &[]);
    let routes = (0..11).rev().map(|i| route(&format!("r_{i}"), &["e1"])).collect::<Vec<_>>();
    let incidence = IncidenceMatrix::build(&network, &routes).unwrap();

    let expected = (0..12).map(|i| format!("e1_{i}")).collect::<Vec<_>>();
    assert_eq!(incidence.lane_ids(), expected.as_slice());
    assert_eq!(incidence.route_ids()[2], "r_2");
    assert_eq!(incidence.route_ids()[10], "r_10");
    assert_approx_eq!(incidence.get("e1_11", "r_10").unwrap(), 1.0 / 12.0);
}

#[test]
fn unknown_route_edge_names_the_route() {
    let network = common::diamond();
    let err = IncidenceMatrix::build(&network, &[route("r_bad", &["AB", "XY"])]).unwrap_err();
    assert!(matches!(err, Error::Configuration { ref entity, .. } if entity == "r_bad"));
}

/// Test that a route through unconnected edges is built with zero weight where no lane qualifies.
#[test]
fn disconnected_route_is_zero() {
    let network = common::diamond();
    let incidence = IncidenceMatrix::build(&network, &[route("r_gap", &["AB", "CD"])]).unwrap();
    assert_eq!(incidence.get("AB_0", "r_gap"), Some(0.0));
    assert_eq!(incidence.get("CD_0", "r_gap"), Some(0.0));
}

#[test]
fn diamond_routes_use_their_branch() {
    let network = common::diamond();
    let routes = [route("r_0", &["AB", "BD"]), route("r_1", &["AC", "CD"])];
    let incidence = IncidenceMatrix::build(&network, &routes).unwrap();
    assert_eq!(incidence.get("AB_0", "r_0"), Some(1.0));
    assert_eq!(incidence.get("BD_0", "r_0"), Some(1.0));
    assert_eq!(incidence.get("CD_0", "r_0"), Some(0.0));
    assert_eq!(incidence.get("DA_0", "r_1"), Some(0.0));

    let flows = incidence.lane_flows(&[100.0, 50.0]);
    assert_approx_eq!(flows[0], 100.0); // AB_0
    assert_approx_eq!(flows[1], 50.0); // AC_0
}
