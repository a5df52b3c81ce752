//! One iteration of the calibration pipeline.
//!
//! Each iteration runs the stages BUILD, SOLVE, SIMULATE, ANALYZE and REPORT
//! strictly in order. The only state shared between iterations is the route
//! demand written on a successful solve; everything else is recomputed and
//! written to the iteration's own directory. Whether another iteration runs
//! is decided by the caller, optionally advised by a [StoppingPolicy].

use crate::assignment::{Assignment, AssignmentOutcome, FlowAssignmentSolver, NnlsSolver, SolveStatus};
use crate::capacity::{estimate_capacity, CapacityTable, LaneParameters};
use crate::config::Config;
use crate::congestion::CongestionAnalyzer;
use crate::error::{Error, Result};
use crate::incidence::IncidenceMatrix;
use crate::network::NetworkModel;
use crate::report::{IterationReport, ReportWriter};
use crate::routes;
use crate::simulator::{iteration_dir, SimulationRequest, Simulator};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// A stage of an iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Build,
    Solve,
    Simulate,
    Analyze,
    Report,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Build => "BUILD",
            Stage::Solve => "SOLVE",
            Stage::Simulate => "SIMULATE",
            Stage::Analyze => "ANALYZE",
            Stage::Report => "REPORT",
        };
        f.write_str(s)
    }
}

/// Advises whether another iteration is needed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum StoppingPolicy {
    /// Leave the decision to the caller.
    #[default]
    Manual,
    /// Stop once every weighted lane is within `epsilon` of the target ratio.
    Tolerance { epsilon: f64 },
}

/// What to do when the assignment has no solution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoSolutionPolicy {
    /// Keep the previous demand and report the iteration as unsolved.
    #[default]
    Retain,
    /// Fail the iteration.
    Fail,
}

/// The advice given after a completed iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    AwaitCaller,
    Continue,
    Converged,
}

impl StoppingPolicy {
    pub fn decide(&self, assignment: &Assignment, lanes: &[LaneParameters]) -> Decision {
        match *self {
            StoppingPolicy::Manual => Decision::AwaitCaller,
            StoppingPolicy::Tolerance { epsilon } => {
                if max_deviation(assignment, lanes) < epsilon {
                    Decision::Converged
                } else {
                    Decision::Continue
                }
            }
        }
    }
}

/// The largest `|ratio - target|` over lanes with positive capacity and weight.
pub fn max_deviation(assignment: &Assignment, lanes: &[LaneParameters]) -> f64 {
    assignment
        .lane_ratios
        .iter()
        .zip(lanes)
        .filter(|(_, lane)| lane.capacity > 0.0 && lane.weight > 0.0)
        .map(|(ratio, _)| (ratio - assignment.target_ratio).abs())
        .fold(0.0, f64::max)
}

/// Summary of a completed iteration.
#[derive(Clone, Debug)]
pub struct IterationSummary {
    pub iter_idx: usize,
    pub dir: PathBuf,
    pub assignment: Assignment,
    /// The number of route generators whose demand was rewritten.
    pub updated_routes: usize,
    /// Lane ids ordered most congested first, limited to the configured count.
    pub bottlenecks: Vec<String>,
    pub max_deviation: f64,
    pub report: IterationReport,
    pub decision: Decision,
}

/// How an iteration ended.
#[derive(Clone, Debug)]
pub enum IterationOutcome {
    Completed(Box<IterationSummary>),
    /// The assignment had no solution; demand was left untouched and nothing was simulated.
    NoSolution { iter_idx: usize, status: SolveStatus },
}

/// Runs calibration iterations against one network and one simulator.
pub struct CalibrationLoop<'a, S> {
    network: &'a NetworkModel,
    config: &'a Config,
    simulator: S,
    solver: FlowAssignmentSolver,
    output_dir: PathBuf,
    end_time: f64,
}

impl<'a, S: Simulator> CalibrationLoop<'a, S> {
    pub fn new(network: &'a NetworkModel, config: &'a Config, simulator: S, output_dir: &Path) -> Self {
        let solver = FlowAssignmentSolver::new(NnlsSolver {
            tolerance: config.assignment.tolerance,
            max_iterations: config.assignment.max_iterations,
        });
        Self {
            network,
            config,
            simulator,
            solver,
            output_dir: output_dir.to_path_buf(),
            end_time: config.simulation.end_time,
        }
    }

    /// Overrides the simulated end time from the config.
    pub fn with_end_time(mut self, end_time: f64) -> Self {
        self.end_time = end_time;
        self
    }

    pub fn simulator(&self) -> &S {
        &self.simulator
    }

    /// Runs one iteration. Re-running an index with identical inputs overwrites
    /// its directory with identical results.
    pub fn run_iteration(&mut self, iter_idx: usize) -> Result<IterationOutcome> {
        let dir = iteration_dir(&self.output_dir, iter_idx);
        std::fs::create_dir_all(&dir)?;

        log::info!("[{iter_idx}] {}", Stage::Build);
        let routes = routes::read_routes(&self.config.routes.path, &self.config.routes.filter)?;
        if routes.is_empty() {
            return Err(Error::config(
                self.config.routes.path.display().to_string(),
                "no routes match the route filter",
            ));
        }
        let incidence = IncidenceMatrix::build(self.network, &routes)?;
        let estimate = estimate_capacity(self.network, &self.config.capacity.params)?;
        let table = match &self.config.capacity.table {
            Some(path) => CapacityTable::load(path)?,
            None => CapacityTable::from_estimate(&estimate),
        };
        table.save(&dir.join("capacity.json"))?;
        let lanes = table.merge(&estimate, incidence.lane_ids());
        log::info!(
            "Built {} lanes x {} routes",
            incidence.lane_ids().len(),
            incidence.route_ids().len()
        );

        log::info!("[{iter_idx}] {}", Stage::Solve);
        let target_ratio = self.config.assignment.target_ratio;
        let assignment = match self.solver.solve(&incidence, target_ratio, &lanes)? {
            AssignmentOutcome::Solved(assignment) => assignment,
            AssignmentOutcome::NoSolution(status) => {
                return match self.config.assignment.on_no_solution {
                    NoSolutionPolicy::Retain => {
                        log::warn!("No assignment for iteration {iter_idx} ({status}); retaining previous demand");
                        Ok(IterationOutcome::NoSolution { iter_idx, status })
                    }
                    NoSolutionPolicy::Fail => Err(Error::InfeasibleAssignment(status)),
                };
            }
        };
        let file = std::fs::File::create(dir.join("assignment.json"))?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), &assignment)?;
        let updated_routes = routes::write_demand(&self.config.routes.path, &assignment.demand())?;
        log::info!("Wrote demand of {updated_routes} routes");

        log::info!("[{iter_idx}] {}", Stage::Simulate);
        let request = SimulationRequest {
            iter_idx,
            output_dir: &self.output_dir,
            end_time: self.end_time,
        };
        let output = self.simulator.run(&request)?;

        log::info!("[{iter_idx}] {}", Stage::Analyze);
        let capacities = incidence
            .lane_ids()
            .iter()
            .map(String::as_str)
            .zip(lanes.iter().map(|lane| lane.capacity))
            .collect::<HashMap<_, _>>();
        let analyzer = CongestionAnalyzer::new(self.config.analysis);
        let rows = analyzer.analyze(
            &output.lane_data.records,
            self.network,
            &capacities,
            &assignment.ratios_by_lane(),
        );
        let bottlenecks = rows
            .iter()
            .take(self.config.analysis.top_n)
            .map(|row| row.lane_id.clone())
            .collect::<Vec<_>>();
        log::info!("Top bottlenecks: {bottlenecks:?}");

        log::info!("[{iter_idx}] {}", Stage::Report);
        let report = ReportWriter::new(&dir, self.config.analysis.top_n).write(
            iter_idx,
            self.network,
            &assignment,
            &rows,
        )?;

        let max_deviation = max_deviation(&assignment, &lanes);
        let decision = self.config.stopping.decide(&assignment, &lanes);
        log::info!("Iteration {iter_idx} done: max deviation {max_deviation:.4}, {decision:?}");

        Ok(IterationOutcome::Completed(Box::new(IterationSummary {
            iter_idx,
            dir,
            assignment,
            updated_routes,
            bottlenecks,
            max_deviation,
            report,
            decision,
        })))
    }
}

#[cfg(test)]
mod test {
    use super::{Decision, StoppingPolicy};
    use crate::assignment::Assignment;
    use crate::capacity::LaneParameters;

    fn assignment(ratios: Vec<f64>) -> Assignment {
        Assignment {
            target_ratio: 0.5,
            route_ids: vec![],
            route_flows: vec![],
            lane_ids: (0..ratios.len()).map(|i| format!("a_{i}")).collect(),
            lane_ratios: ratios,
            objective: 0.0,
        }
    }

    #[test]
    fn tolerance_ignores_lanes_without_capacity() {
        let lanes = [
            LaneParameters { capacity: 900.0, weight: 1.0 },
            LaneParameters { capacity: 0.0, weight: 1.0 },
        ];
        let policy = StoppingPolicy::Tolerance { epsilon: 0.05 };
        assert_eq!(policy.decide(&assignment(vec![0.52, 0.0]), &lanes), Decision::Converged);
        assert_eq!(policy.decide(&assignment(vec![0.6, 0.0]), &lanes), Decision::Continue);
        assert_eq!(
            StoppingPolicy::Manual.decide(&assignment(vec![0.5, 0.0]), &lanes),
            Decision::AwaitCaller
        );
    }
}
