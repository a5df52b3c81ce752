//! The lane-by-route incidence matrix.

use crate::error::Result;
use crate::network::{Lane, NetworkModel};
use crate::routes::Route;
use crate::util::natural_cmp;
use crate::{EdgeId, LaneId};
use ndarray::{Array1, Array2};
use std::collections::{HashMap, HashSet};

/// `values[[l, r]]` is the fraction of route `r`'s flow that uses lane `l`.
/// Rows follow `lane_ids` and columns follow `route_ids`, both in natural order.
#[derive(Clone, Debug)]
pub struct IncidenceMatrix {
    lane_ids: Vec<String>,
    route_ids: Vec<String>,
    values: Array2<f64>,
}

impl IncidenceMatrix {
    /// Builds the matrix over every lane of the network and the given routes.
    pub fn build(network: &NetworkModel, routes: &[Route]) -> Result<Self> {
        let mut lanes = network.iter_lanes().collect::<Vec<_>>();
        lanes.sort_by(|a, b| natural_cmp(a.id(), b.id()));
        let mut routes = routes.iter().collect::<Vec<_>>();
        routes.sort_by(|a, b| natural_cmp(&a.id, &b.id));

        let rows = lanes
            .iter()
            .enumerate()
            .map(|(row, lane)| (lane.key(), row))
            .collect::<HashMap<LaneId, usize>>();
        let mut values = Array2::<f64>::zeros((lanes.len(), routes.len()));

        for (col, route) in routes.iter().enumerate() {
            let edges = network.route_edges(route)?;
            for (from, to) in network.route_gaps(route)? {
                log::warn!("Route {} has no connection from {from} to {to}", route.id);
            }

            let mut seen = HashSet::new();
            for (idx, edge) in edges.iter().enumerate() {
                // Only the first visit of an edge counts.
                if !seen.insert(*edge) {
                    continue;
                }
                let prev = idx.checked_sub(1).map(|i| edges[i]);
                let next = edges.get(idx + 1).copied();
                let usable = network
                    .get_edge(*edge)
                    .lanes()
                    .iter()
                    .map(|id| network.get_lane(*id))
                    .filter(|lane| lane_carries(network, lane, prev, next))
                    .collect::<Vec<_>>();
                let weight = 1.0 / usable.len() as f64;
                for lane in usable {
                    values[[rows[&lane.key()], col]] = weight;
                }
            }
        }

        Ok(Self {
            lane_ids: lanes.iter().map(|l| l.id().to_string()).collect(),
            route_ids: routes.iter().map(|r| r.id.clone()).collect(),
            values,
        })
    }

    /// The row labels.
    pub fn lane_ids(&self) -> &[String] {
        &self.lane_ids
    }

    /// The column labels.
    pub fn route_ids(&self) -> &[String] {
        &self.route_ids
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Gets the entry for a lane and route by id, if both exist.
    pub fn get(&self, lane_id: &str, route_id: &str) -> Option<f64> {
        let row = self.lane_ids.iter().position(|id| id == lane_id)?;
        let col = self.route_ids.iter().position(|id| id == route_id)?;
        Some(self.values[[row, col]])
    }

    /// The flow on every lane produced by the given route flows.
    pub fn lane_flows(&self, route_flows: &[f64]) -> Array1<f64> {
        self.values.dot(&Array1::from(route_flows.to_vec()))
    }
}

/// Whether a lane can carry a route through the edge, given the route's
/// neighbouring edges. A route of a single edge may use any of its lanes.
fn lane_carries(network: &NetworkModel, lane: &Lane, prev: Option<EdgeId>, next: Option<EdgeId>) -> bool {
    let from_prev = prev.map_or(true, |e| network.lane_has_incoming_from_edge(lane, e));
    let to_next = next.map_or(true, |e| network.lane_has_outgoing_to_edge(lane, e));
    from_prev && to_next
}
