//! Rule-based lane capacity estimation from junction control logic.
//!
//! Every lane entering a junction receives a capacity in vehicles per hour
//! derived from the junction's [ControlType]. Each control type has its own
//! rule returning the capacities of that junction's approach lanes; the
//! results are merged once into a [CapacityEstimate].

use crate::error::{Error, Result};
use crate::network::{ControlType, NetworkModel, Node};
use crate::util::natural_cmp;
use crate::LaneId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

pub use observed::observed_max_volume;
pub use table::{CapacityEntry, CapacityTable, LaneParameters};

mod observed;
mod table;

/// Saturation flow of an uncontrolled lane in veh/h.
pub const DEFAULT_CAPACITY: f64 = 1800.0;

/// Combined discharge rate of a stop-controlled junction in veh/h.
pub const STOP_SIGN_CAPACITY: f64 = 720.0;

/// The lowest priority rank an edge can carry.
const LOWEST_PRIORITY: i32 = -1;

/// Parameters of the capacity rules.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityParams {
    pub default_capacity: f64,
    pub stop_sign_capacity: f64,
}

impl Default for CapacityParams {
    fn default() -> Self {
        Self {
            default_capacity: DEFAULT_CAPACITY,
            stop_sign_capacity: STOP_SIGN_CAPACITY,
        }
    }
}

/// The estimated capacity of one lane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LaneCapacity {
    /// Capacity in veh/h.
    pub capacity: f64,
    /// The control type of the junction the lane enters.
    pub control: ControlType,
}

/// Capacities of every lane that enters a junction, keyed by lane id.
#[derive(Clone, Debug, Default)]
pub struct CapacityEstimate {
    by_lane: HashMap<String, LaneCapacity>,
}

impl CapacityEstimate {
    pub fn get(&self, lane_id: &str) -> Option<&LaneCapacity> {
        self.by_lane.get(lane_id)
    }

    pub fn capacity(&self, lane_id: &str) -> Option<f64> {
        self.get(lane_id).map(|c| c.capacity)
    }

    pub fn len(&self) -> usize {
        self.by_lane.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_lane.is_empty()
    }

    /// The estimates in natural lane id order.
    pub fn iter_sorted(&self) -> impl Iterator<Item = (&str, &LaneCapacity)> {
        let mut entries = self
            .by_lane
            .iter()
            .map(|(id, c)| (id.as_str(), c))
            .collect::<Vec<_>>();
        entries.sort_by(|a, b| natural_cmp(a.0, b.0));
        entries.into_iter()
    }

    /// The lane ids grouped by the control type of their junction.
    pub fn lanes_by_control(&self) -> HashMap<ControlType, Vec<&str>> {
        let mut grouped: HashMap<ControlType, Vec<&str>> = HashMap::new();
        for (id, c) in self.iter_sorted() {
            grouped.entry(c.control).or_default().push(id);
        }
        grouped
    }
}

/// Estimates the capacity of every lane entering a junction.
pub fn estimate_capacity(network: &NetworkModel, params: &CapacityParams) -> Result<CapacityEstimate> {
    let mut by_lane = HashMap::with_capacity(network.num_lanes());
    for node in network.iter_nodes() {
        let control = node.control();
        let capacities = match control {
            ControlType::TrafficLight => traffic_light(network, node, params)?,
            ControlType::Priority => priority(network, node, params)?,
            ControlType::PriorityStop => priority_stop(network, node, params),
            ControlType::AllwayStop => allway_stop(network, node, params),
            ControlType::DeadEnd => dead_end(network, node, params),
        };
        for (lane, capacity) in capacities {
            let id = network.get_lane(lane).id().to_string();
            by_lane.insert(id, LaneCapacity { capacity, control });
        }
    }
    log::info!("Estimated capacity of {} lanes", by_lane.len());
    Ok(CapacityEstimate { by_lane })
}

/// Lanes share the default capacity in proportion to the green and amber time of
/// their signalized connection. A lane with several connections takes the largest share.
fn traffic_light(
    network: &NetworkModel,
    node: &Node,
    params: &CapacityParams,
) -> Result<Vec<(LaneId, f64)>> {
    let program = node
        .program()
        .ok_or_else(|| Error::config(node.id(), "traffic light has no signal program"))?;

    let mut shares: HashMap<LaneId, f64> = HashMap::new();
    for (conn, link_index) in network.signalized_connections(node) {
        let share = program.green_share(link_index).ok_or_else(|| {
            Error::config(
                node.id(),
                format!(
                    "link index {link_index} is outside the {}-link signal program",
                    program.num_links()
                ),
            )
        })?;
        let entry = shares.entry(conn.from).or_insert(0.0);
        *entry = entry.max(share);
    }

    Ok(shares
        .into_iter()
        .map(|(lane, share)| (lane, params.default_capacity * share))
        .collect())
}

/// Gets the coefficient table for a set of distinct priority ranks.
/// Coefficients are listed in ascending rank order.
pub fn priority_coefficients(ranks: &BTreeSet<i32>) -> Option<&'static [f64]> {
    match ranks.len() {
        4 => Some(&[0.4, 0.3, 0.2, 0.1]),
        3 => Some(&[0.6, 0.3, 0.1]),
        2 if ranks.contains(&LOWEST_PRIORITY) => Some(&[0.8, 0.2]),
        2 => Some(&[0.6, 0.4]),
        1 => Some(&[0.25, 0.25, 0.25, 0.25]),
        _ => None,
    }
}

fn priority(network: &NetworkModel, node: &Node, params: &CapacityParams) -> Result<Vec<(LaneId, f64)>> {
    let ranks = network
        .incoming_edges(node)
        .map(|edge| edge.priority())
        .collect::<BTreeSet<_>>();
    let coefs = priority_coefficients(&ranks).ok_or_else(|| {
        Error::config(
            node.id(),
            format!("unsupported number of priority ranks: {ranks:?}"),
        )
    })?;

    Ok(network
        .incoming_edges(node)
        .flat_map(|edge| {
            let rank = ranks.iter().position(|r| *r == edge.priority()).unwrap_or(0);
            let capacity = params.default_capacity * coefs[rank];
            edge.lanes().iter().map(move |lane| (*lane, capacity))
        })
        .collect())
}

/// Edges at the highest rank are major roads and the rest stop. Minor lanes split the
/// stop sign capacity; major lanes keep the remainder of the default capacity.
/// When no edge ranks below the top, every approach stops.
fn priority_stop(network: &NetworkModel, node: &Node, params: &CapacityParams) -> Vec<(LaneId, f64)> {
    let Some(max_rank) = network.incoming_edges(node).map(|e| e.priority()).max() else {
        return vec![];
    };
    let num_edges = network.incoming_edges(node).count();
    let num_minor = network
        .incoming_edges(node)
        .filter(|e| e.priority() != max_rank)
        .count();
    let all_minor = num_minor == 0;
    let num_minor = if all_minor { num_edges } else { num_minor };

    let minor_capacity = params.stop_sign_capacity / num_minor as f64;
    let major_capacity = params.default_capacity * (1.0 - 1.0 / num_minor as f64);

    network
        .incoming_edges(node)
        .flat_map(|edge| {
            let capacity = if all_minor || edge.priority() != max_rank {
                minor_capacity
            } else {
                major_capacity
            };
            edge.lanes().iter().map(move |lane| (*lane, capacity))
        })
        .collect()
}

fn allway_stop(network: &NetworkModel, node: &Node, params: &CapacityParams) -> Vec<(LaneId, f64)> {
    let num_edges = node.incoming().len();
    network
        .incoming_edges(node)
        .flat_map(|edge| {
            let capacity = params.stop_sign_capacity / num_edges as f64;
            edge.lanes().iter().map(move |lane| (*lane, capacity))
        })
        .collect()
}

fn dead_end(network: &NetworkModel, node: &Node, params: &CapacityParams) -> Vec<(LaneId, f64)> {
    network
        .incoming_edges(node)
        .flat_map(|edge| edge.lanes().iter().map(|lane| (*lane, params.default_capacity)))
        .collect()
}
