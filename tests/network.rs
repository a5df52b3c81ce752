//! Tests of loading and querying the network model.

mod common;

use assert_approx_eq::assert_approx_eq;
use traffic_calib::network::{ConnectionRecord, ControlType};
use traffic_calib::{Error, NetworkModel, Route};

#[test]
fn load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("network.json");
    std::fs::write(&path, serde_json::to_string(&common::diamond_document()).unwrap()).unwrap();

    let network = NetworkModel::load(&path).unwrap();
    assert_eq!(network.iter_nodes().count(), 4);
    assert_eq!(network.iter_edges().count(), 5);
    assert_eq!(network.num_lanes(), 5);
    assert_eq!(network.connections().len(), 6);
    assert_eq!(network.node("D").unwrap().control(), ControlType::TrafficLight);
}

#[test]
fn lane_geometry() {
    let network = common::diamond();
    let lane = network.lane("AB_0").unwrap();
    assert_approx_eq!(lane.length(), 100.0 * 2f64.sqrt());
    assert_eq!(lane.shape().len(), 2);
    assert_eq!(network.lane_edge(lane).id(), "AB");
    // An explicit length wins over the shape.
    assert_eq!(network.lane("DA_0").unwrap().length(), 200.0);
}

#[test]
fn connection_lookup_by_key() {
    let network = common::diamond();
    let conn = network.connection("BD_0>DA_0").unwrap();
    assert_eq!(conn.link_index, Some(0));
    assert_eq!(network.get_lane(conn.from).id(), "BD_0");
    assert!(network.connection("DA_0>BD_0").is_none());
    assert!(network.connection_between("AC_0", "CD_0").is_some());
}

#[test]
fn signalized_connections_of_a_junction() {
    let network = common::diamond();
    let node = network.node("D").unwrap();
    let mut indices = network
        .signalized_connections(node)
        .map(|(_, idx)| idx)
        .collect::<Vec<_>>();
    indices.sort();
    assert_eq!(indices, [0, 1]);
    assert_eq!(network.incoming_edges(node).count(), 2);
    assert_eq!(network.node("A").unwrap().incoming().len(), 1);
}

#[test]
fn lane_adjacency_predicates() {
    let network = common::diamond();
    let ab = network.lane("AB_0").unwrap();
    let bd = network.edge("BD").unwrap().key();
    let cd = network.edge("CD").unwrap().key();
    let da = network.edge("DA").unwrap().key();
    assert!(network.lane_has_outgoing_to_edge(ab, bd));
    assert!(!network.lane_has_outgoing_to_edge(ab, cd));
    assert!(network.lane_has_incoming_from_edge(ab, da));
    assert!(network.edges_connected(bd, da));
}

#[test]
fn route_connectivity() {
    let network = common::diamond();
    let route = Route {
        id: "r_x".into(),
        edges: vec!["AB".into(), "BD".into(), "CD".into()],
    };
    assert_eq!(network.route_gaps(&route).unwrap(), [("BD", "CD")]);
    assert_eq!(network.route_edges(&route).unwrap().len(), 3);
}

#[test]
fn fastest_path_takes_shorter_branch() {
    let mut doc = common::diamond_document();
    // Make the northern branch slow.
    doc.edges[0].lanes[0].speed = 1.0;
    let network = NetworkModel::from_document(&doc).unwrap();

    let path = network.fastest_path("DA", "CD").unwrap();
    let ids = path.iter().map(|e| e.id()).collect::<Vec<_>>();
    assert_eq!(ids, ["DA", "AC", "CD"]);
    let path = network.fastest_path("AB", "CD").unwrap();
    let ids = path.iter().map(|e| e.id()).collect::<Vec<_>>();
    assert_eq!(ids, ["AB", "BD", "DA", "AC", "CD"]);
    assert!(network.fastest_path("AB", "ZZ").is_none());
}

#[test]
fn connection_between_distant_edges_is_rejected() {
    let mut doc = common::diamond_document();
    doc.connections.push(ConnectionRecord {
        from: "AB_0".into(),
        to: "CD_0".into(),
        link_index: None,
    });
    let err = NetworkModel::from_document(&doc).unwrap_err();
    assert!(matches!(err, Error::Configuration { ref entity, .. } if entity == "AB_0>CD_0"));
}

#[test]
fn duplicate_and_dangling_ids_are_rejected() {
    let mut doc = common::diamond_document();
    doc.nodes.push(doc.nodes[0].clone());
    assert!(matches!(
        NetworkModel::from_document(&doc),
        Err(Error::Configuration { .. })
    ));

    let mut doc = common::diamond_document();
    doc.edges[0].to = "Q".into();
    let err = NetworkModel::from_document(&doc).unwrap_err();
    assert!(matches!(err, Error::Configuration { ref entity, .. } if entity == "AB"));
}
