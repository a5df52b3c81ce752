//! Lane capacity calibration and route demand assignment for traffic
//! micro-simulation.

pub use assignment::{Assignment, AssignmentOutcome, FlowAssignmentSolver, NnlsSolver, QpSolver, SolveStatus};
pub use calibration::{CalibrationLoop, Decision, IterationOutcome, IterationSummary, StoppingPolicy};
pub use capacity::{estimate_capacity, CapacityEstimate, CapacityParams, CapacityTable};
pub use cgmath;
pub use config::Config;
pub use congestion::{CongestionAnalyzer, CongestionMetric};
pub use error::{Error, Result};
pub use incidence::IncidenceMatrix;
pub use measurements::{LaneDataLog, LaneMeasurement};
pub use network::NetworkModel;
pub use routes::{Route, RouteFilter};
pub use simulator::{ReplayOutput, SimulationRequest, Simulator, SumoProcess};
use slotmap::{new_key_type, SlotMap};
pub use slotmap::{Key, KeyData};
pub use util::{natural_cmp, sort_natural, Interval};

pub mod assignment;
pub mod calibration;
pub mod capacity;
pub mod config;
pub mod congestion;
mod error;
pub mod incidence;
pub mod math;
pub mod measurements;
pub mod network;
pub mod report;
pub mod routes;
pub mod simulator;
mod util;
mod xml;

new_key_type! {
    /// Unique ID of a [Node](network::Node).
    pub struct NodeId;
    /// Unique ID of an [Edge](network::Edge).
    pub struct EdgeId;
    /// Unique ID of a [Lane](network::Lane).
    pub struct LaneId;
}

type NodeSet = SlotMap<NodeId, network::Node>;
type EdgeSet = SlotMap<EdgeId, network::Edge>;
type LaneSet = SlotMap<LaneId, network::Lane>;
