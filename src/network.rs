//! The road network: junctions, edges, lanes and the connections between lanes.

use crate::error::{Error, Result};
use crate::math::{point, polyline_length, Point2d};
use crate::routes::Route;
use crate::{EdgeId, EdgeSet, LaneId, LaneSet, NodeId, NodeSet};
pub use document::{
    ConnectionRecord, EdgeRecord, LaneRecord, NetworkDocument, NodeRecord, PhaseRecord,
    ProgramRecord,
};
use itertools::Itertools;
pub use lane::{Connection, Edge, Lane};
pub use node::{ControlType, Node};
pub use signal::{LightState, Phase, SignalProgram};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::path::Path;

mod document;
mod lane;
mod node;
mod signal;

/// Builds the lookup key of a connection, `"{from_lane}>{to_lane}"`.
pub fn connection_key(from_lane: &str, to_lane: &str) -> String {
    format!("{from_lane}>{to_lane}")
}

/// An immutable, fully validated road network.
#[derive(Debug, Default)]
pub struct NetworkModel {
    /// The junctions.
    nodes: NodeSet,
    /// The directed edges.
    edges: EdgeSet,
    /// The lanes of every edge.
    lanes: LaneSet,
    /// The lane-to-lane connections.
    connections: Vec<Connection>,
    node_ids: HashMap<String, NodeId>,
    edge_ids: HashMap<String, EdgeId>,
    lane_ids: HashMap<String, LaneId>,
    /// Maps `"{from}>{to}"` to an index into `connections`.
    connection_ids: HashMap<String, usize>,
}

impl NetworkModel {
    /// Loads a JSON network definition from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let doc: NetworkDocument = serde_json::from_reader(std::io::BufReader::new(file))?;
        let network = Self::from_document(&doc)?;
        log::info!(
            "Loaded network {} ({} nodes, {} edges, {} lanes, {} connections)",
            path.display(),
            network.nodes.len(),
            network.edges.len(),
            network.lanes.len(),
            network.connections.len()
        );
        Ok(network)
    }

    /// Builds the network, validating every reference in the document.
    pub fn from_document(doc: &NetworkDocument) -> Result<Self> {
        let mut network = Self::default();
        for record in &doc.nodes {
            network.add_node(record)?;
        }
        for record in &doc.edges {
            network.add_edge(record)?;
        }
        for record in &doc.connections {
            network.add_connection(record)?;
        }
        Ok(network)
    }

    fn add_node(&mut self, record: &NodeRecord) -> Result<NodeId> {
        if self.node_ids.contains_key(&record.id) {
            return Err(Error::config(&record.id, "duplicate node id"));
        }
        let control = ControlType::from_name(&record.kind).ok_or_else(|| {
            Error::config(&record.id, format!("unknown control type `{}`", record.kind))
        })?;
        let program = record
            .program
            .as_ref()
            .map(|program| {
                SignalProgram::parse(
                    &record.id,
                    program
                        .phases
                        .iter()
                        .map(|phase| (phase.duration, phase.state.as_str())),
                )
            })
            .transpose()?;

        let key = self.nodes.insert_with_key(|key| Node {
            key,
            id: record.id.clone(),
            control,
            program,
            coord: Point2d::new(record.x, record.y),
            incoming: vec![],
            outgoing: vec![],
        });
        self.node_ids.insert(record.id.clone(), key);
        Ok(key)
    }

    fn add_edge(&mut self, record: &EdgeRecord) -> Result<EdgeId> {
        if self.edge_ids.contains_key(&record.id) {
            return Err(Error::config(&record.id, "duplicate edge id"));
        }
        let lookup = |node_id: &str| {
            self.node_ids.get(node_id).copied().ok_or_else(|| {
                Error::config(&record.id, format!("references unknown node `{node_id}`"))
            })
        };
        let from = lookup(&record.from)?;
        let to = lookup(&record.to)?;

        let edge_id = self.edges.insert_with_key(|key| Edge {
            key,
            id: record.id.clone(),
            priority: record.priority,
            from,
            to,
            lanes: SmallVec::new(),
        });
        self.edge_ids.insert(record.id.clone(), edge_id);
        self.nodes[from].outgoing.push(edge_id);
        self.nodes[to].incoming.push(edge_id);

        for lane in &record.lanes {
            if self.lane_ids.contains_key(&lane.id) {
                return Err(Error::config(&lane.id, "duplicate lane id"));
            }
            let shape = lane.shape.iter().copied().map(point).collect::<Vec<_>>();
            let length = lane.length.unwrap_or_else(|| polyline_length(&shape));
            let lane_id = self.lanes.insert_with_key(|key| Lane {
                key,
                id: lane.id.clone(),
                edge: edge_id,
                length,
                speed: lane.speed,
                shape,
                links_in: SmallVec::new(),
                links_out: SmallVec::new(),
            });
            self.lane_ids.insert(lane.id.clone(), lane_id);
            self.edges[edge_id].lanes.push(lane_id);
        }
        Ok(edge_id)
    }

    fn add_connection(&mut self, record: &ConnectionRecord) -> Result<()> {
        let key = connection_key(&record.from, &record.to);
        let lookup = |lane_id: &str| {
            self.lane_ids.get(lane_id).copied().ok_or_else(|| {
                Error::config(&key, format!("references unknown lane `{lane_id}`"))
            })
        };
        let from = lookup(&record.from)?;
        let to = lookup(&record.to)?;

        let from_edge = &self.edges[self.lanes[from].edge];
        let to_edge = &self.edges[self.lanes[to].edge];
        if from_edge.to != to_edge.from {
            return Err(Error::config(
                &key,
                format!(
                    "edges `{}` and `{}` do not meet at a junction",
                    from_edge.id, to_edge.id
                ),
            ));
        }

        self.lanes[from].links_out.push(to);
        self.lanes[to].links_in.push(from);
        self.connection_ids.insert(key, self.connections.len());
        self.connections.push(Connection {
            from,
            to,
            link_index: record.link_index,
        });
        Ok(())
    }

    /// Gets a node by its external id.
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.node_ids.get(id).map(|key| &self.nodes[*key])
    }

    /// Gets an edge by its external id.
    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edge_ids.get(id).map(|key| &self.edges[*key])
    }

    /// Gets a lane by its external id.
    pub fn lane(&self, id: &str) -> Option<&Lane> {
        self.lane_ids.get(id).map(|key| &self.lanes[*key])
    }

    /// Gets a reference to the node with the given key.
    pub fn get_node(&self, key: NodeId) -> &Node {
        &self.nodes[key]
    }

    /// Gets a reference to the edge with the given key.
    pub fn get_edge(&self, key: EdgeId) -> &Edge {
        &self.edges[key]
    }

    /// Gets a reference to the lane with the given key.
    pub fn get_lane(&self, key: LaneId) -> &Lane {
        &self.lanes[key]
    }

    /// Returns an iterator over all the nodes.
    pub fn iter_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Returns an iterator over all the edges.
    pub fn iter_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    /// Returns an iterator over all the lanes.
    pub fn iter_lanes(&self) -> impl Iterator<Item = &Lane> {
        self.lanes.values()
    }

    pub fn num_lanes(&self) -> usize {
        self.lanes.len()
    }

    /// All lane connections.
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Looks up a connection by its `"{from_lane}>{to_lane}"` key.
    pub fn connection(&self, key: &str) -> Option<&Connection> {
        self.connection_ids.get(key).map(|idx| &self.connections[*idx])
    }

    /// Looks up the connection between two lanes.
    pub fn connection_between(&self, from_lane: &str, to_lane: &str) -> Option<&Connection> {
        self.connection(&connection_key(from_lane, to_lane))
    }

    /// The edge a lane belongs to.
    pub fn lane_edge(&self, lane: &Lane) -> &Edge {
        &self.edges[lane.edge]
    }

    /// The edges ending at a node.
    pub fn incoming_edges<'a>(&'a self, node: &'a Node) -> impl Iterator<Item = &'a Edge> + 'a {
        node.incoming.iter().map(move |key| &self.edges[*key])
    }

    /// The signalized connections passing through a node, with their link indices.
    pub fn signalized_connections<'a>(
        &'a self,
        node: &'a Node,
    ) -> impl Iterator<Item = (&'a Connection, usize)> + 'a {
        self.connections.iter().filter_map(move |conn| {
            let link_index = conn.link_index?;
            let edge = &self.edges[self.lanes[conn.from].edge];
            (edge.to == node.key).then_some((conn, link_index))
        })
    }

    /// Whether the lane connects into any lane of `edge`.
    pub fn lane_has_outgoing_to_edge(&self, lane: &Lane, edge: EdgeId) -> bool {
        lane.links_out.iter().any(|id| self.lanes[*id].edge == edge)
    }

    /// Whether any lane of `edge` connects into the lane.
    pub fn lane_has_incoming_from_edge(&self, lane: &Lane, edge: EdgeId) -> bool {
        lane.links_in.iter().any(|id| self.lanes[*id].edge == edge)
    }

    /// Whether at least one connection leads from `from` into `to`.
    pub fn edges_connected(&self, from: EdgeId, to: EdgeId) -> bool {
        self.edges[from]
            .lanes
            .iter()
            .any(|id| self.lane_has_outgoing_to_edge(&self.lanes[*id], to))
    }

    /// Resolves the edges of a route, naming the route if one is unknown.
    pub fn route_edges(&self, route: &Route) -> Result<Vec<EdgeId>> {
        route
            .edges
            .iter()
            .map(|edge_id| {
                self.edge_ids.get(edge_id).copied().ok_or_else(|| {
                    Error::config(&route.id, format!("references unknown edge `{edge_id}`"))
                })
            })
            .collect()
    }

    /// Finds consecutive edge pairs of a route that no connection links.
    pub fn route_gaps<'a>(&self, route: &'a Route) -> Result<Vec<(&'a str, &'a str)>> {
        let edges = self.route_edges(route)?;
        Ok(edges
            .windows(2)
            .zip(route.edges.windows(2))
            .filter(|(keys, _)| !self.edges_connected(keys[0], keys[1]))
            .map(|(_, ids)| (ids[0].as_str(), ids[1].as_str()))
            .collect())
    }

    /// Finds the fastest sequence of edges from one edge to another, if one exists.
    pub fn fastest_path(&self, from_edge: &str, to_edge: &str) -> Option<Vec<&Edge>> {
        let src = *self.edge_ids.get(from_edge)?;
        let dst = *self.edge_ids.get(to_edge)?;
        let (path, _) = pathfinding::directed::dijkstra::dijkstra(
            &src,
            |id| self.successors(*id),
            |id| *id == dst,
        )?;
        Some(path.into_iter().map(|id| &self.edges[id]).collect())
    }

    /// The edges reachable from an edge, costed by their travel time in tenths of a second.
    fn successors(&self, edge_id: EdgeId) -> Vec<(EdgeId, u64)> {
        self.edges[edge_id]
            .lanes
            .iter()
            .flat_map(|id| self.lanes[*id].links_out.iter())
            .map(|id| self.lanes[*id].edge)
            .unique()
            .map(|next| (next, self.travel_cost(next)))
            .collect()
    }

    fn travel_cost(&self, edge_id: EdgeId) -> u64 {
        self.edges[edge_id]
            .lanes
            .iter()
            .map(|id| {
                let lane = &self.lanes[*id];
                (10.0 * lane.length / lane.speed.max(0.1)) as u64
            })
            .min()
            .unwrap_or(0)
    }
}
