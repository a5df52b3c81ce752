//! Route flow assignment towards a target volume/capacity ratio.
//!
//! The program solved is
//!
//! ```text
//! minimize   Σ_l w_l² · ((A f)_l / c_l − d)²
//! subject to f ≥ 0
//! ```
//!
//! where `A` is the [IncidenceMatrix], `c` the lane capacities, `w` the lane
//! weights and `d` the target ratio. It is handed to a [QpSolver] as the
//! least-squares design `M = diag(w / c) · A`, `b = w · d`.

use crate::capacity::LaneParameters;
use crate::error::{Error, Result};
use crate::incidence::IncidenceMatrix;
use ndarray::{Array1, Array2};
pub use nnls::NnlsSolver;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

mod nnls;

/// The termination status reported by a solver backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    IterationLimit,
    NumericalError,
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SolveStatus::Optimal => "optimal",
            SolveStatus::Infeasible => "infeasible",
            SolveStatus::IterationLimit => "iteration limit reached",
            SolveStatus::NumericalError => "numerical error",
        };
        f.write_str(s)
    }
}

/// The raw result of a solver backend.
#[derive(Clone, Debug)]
pub struct SolverOutput {
    pub status: SolveStatus,
    pub solution: Vec<f64>,
}

impl SolverOutput {
    pub fn failed(status: SolveStatus, n: usize) -> Self {
        Self {
            status,
            solution: vec![0.0; n],
        }
    }
}

/// A backend for non-negative weighted least squares, `min ||M x − b||²` with `x ≥ 0`.
pub trait QpSolver {
    fn solve(&self, design: &Array2<f64>, target: &Array1<f64>) -> SolverOutput;
}

/// A solved assignment.
#[derive(Clone, Debug, Serialize)]
pub struct Assignment {
    /// The target volume/capacity ratio.
    pub target_ratio: f64,
    pub route_ids: Vec<String>,
    /// Flow of each route in veh/h.
    pub route_flows: Vec<f64>,
    pub lane_ids: Vec<String>,
    /// Realized volume/capacity ratio of each lane; zero for lanes without capacity.
    pub lane_ratios: Vec<f64>,
    /// The value of the objective at the solution.
    pub objective: f64,
}

impl Assignment {
    /// Route demand in whole vehicles per hour, keyed by route id.
    pub fn demand(&self) -> HashMap<String, f64> {
        self.route_ids
            .iter()
            .cloned()
            .zip(self.route_flows.iter().map(|f| f.round()))
            .collect()
    }

    /// The realized ratio of a lane, keyed by lane id.
    pub fn ratios_by_lane(&self) -> HashMap<&str, f64> {
        self.lane_ids
            .iter()
            .map(String::as_str)
            .zip(self.lane_ratios.iter().copied())
            .collect()
    }
}

/// The result of a solve: either an assignment or the reason there is none.
#[derive(Clone, Debug)]
pub enum AssignmentOutcome {
    Solved(Assignment),
    NoSolution(SolveStatus),
}

impl AssignmentOutcome {
    /// Converts the outcome into a result, treating no solution as an error.
    pub fn into_result(self) -> Result<Assignment> {
        match self {
            AssignmentOutcome::Solved(assignment) => Ok(assignment),
            AssignmentOutcome::NoSolution(status) => Err(Error::InfeasibleAssignment(status)),
        }
    }
}

/// Formulates the assignment program and interprets the backend's answer.
#[derive(Clone, Debug, Default)]
pub struct FlowAssignmentSolver<S = NnlsSolver> {
    backend: S,
}

impl<S: QpSolver> FlowAssignmentSolver<S> {
    pub fn new(backend: S) -> Self {
        Self { backend }
    }

    /// Solves for route flows. `lanes` must follow the incidence matrix's row order.
    pub fn solve(
        &self,
        incidence: &IncidenceMatrix,
        target_ratio: f64,
        lanes: &[LaneParameters],
    ) -> Result<AssignmentOutcome> {
        let a = incidence.values();
        if lanes.len() != a.nrows() {
            return Err(Error::config(
                "assignment",
                format!("{} lane parameters for {} lanes", lanes.len(), a.nrows()),
            ));
        }

        let (design, target) = Self::design(a, target_ratio, lanes);
        let output = self.backend.solve(&design, &target);
        if output.status != SolveStatus::Optimal {
            log::warn!("Flow assignment failed: {}", output.status);
            return Ok(AssignmentOutcome::NoSolution(output.status));
        }
        if output.solution.len() != a.ncols() || output.solution.iter().any(|f| !f.is_finite()) {
            log::warn!("Flow assignment returned an unusable solution");
            return Ok(AssignmentOutcome::NoSolution(SolveStatus::NumericalError));
        }

        let route_flows = output.solution.iter().map(|f| f.max(0.0)).collect::<Vec<_>>();
        let lane_ratios = realized_ratios(a, lanes, &route_flows);
        let objective = objective(a, target_ratio, lanes, &route_flows);
        log::info!(
            "Assigned {} routes, objective {objective:.6}",
            route_flows.len()
        );

        Ok(AssignmentOutcome::Solved(Assignment {
            target_ratio,
            route_ids: incidence.route_ids().to_vec(),
            route_flows,
            lane_ids: incidence.lane_ids().to_vec(),
            lane_ratios,
            objective,
        }))
    }

    /// Assembles `M = diag(w / c) · A` and `b = w · d`.
    /// Lanes without positive capacity contribute an empty row.
    fn design(a: &Array2<f64>, target_ratio: f64, lanes: &[LaneParameters]) -> (Array2<f64>, Array1<f64>) {
        let mut design = a.clone();
        let mut target = Array1::<f64>::zeros(a.nrows());
        for (l, lane) in lanes.iter().enumerate() {
            let mut row = design.row_mut(l);
            if lane.capacity > 0.0 {
                row.mapv_inplace(|v| v * lane.weight / lane.capacity);
                target[l] = lane.weight * target_ratio;
            } else {
                row.fill(0.0);
            }
        }
        (design, target)
    }
}

/// `(A f)_l / c_l` for every lane, or zero where the capacity is unknown.
pub fn realized_ratios(a: &Array2<f64>, lanes: &[LaneParameters], route_flows: &[f64]) -> Vec<f64> {
    let flows = a.dot(&Array1::from(route_flows.to_vec()));
    flows
        .iter()
        .zip(lanes)
        .map(|(flow, lane)| {
            if lane.capacity > 0.0 {
                flow / lane.capacity
            } else {
                0.0
            }
        })
        .collect()
}

/// Evaluates the assignment objective over lanes with positive capacity.
pub fn objective(a: &Array2<f64>, target_ratio: f64, lanes: &[LaneParameters], route_flows: &[f64]) -> f64 {
    realized_ratios(a, lanes, route_flows)
        .iter()
        .zip(lanes)
        .filter(|(_, lane)| lane.capacity > 0.0)
        .map(|(ratio, lane)| (lane.weight * (ratio - target_ratio)).powi(2))
        .sum()
}
