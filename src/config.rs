//! The calibration configuration file.

use crate::calibration::{NoSolutionPolicy, StoppingPolicy};
use crate::capacity::CapacityParams;
use crate::congestion::AnalysisParams;
use crate::error::Result;
use crate::routes::RouteFilter;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Everything a calibration run needs besides the iteration index.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The JSON network definition.
    pub network: PathBuf,
    pub routes: RouteConfig,
    pub capacity: CapacityConfig,
    pub assignment: AssignmentConfig,
    pub analysis: AnalysisParams,
    pub simulation: SimulationConfig,
    pub stopping: StoppingPolicy,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    /// The route definition read by the simulator; its demand is rewritten every iteration.
    pub path: PathBuf,
    #[serde(flatten)]
    pub filter: RouteFilter,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityConfig {
    #[serde(flatten)]
    pub params: CapacityParams,
    /// Optional capacity table merged over the rule-based estimate.
    pub table: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AssignmentConfig {
    /// The desired volume/capacity ratio on every lane.
    pub target_ratio: f64,
    pub on_no_solution: NoSolutionPolicy,
    /// Optimality tolerance of the solver.
    pub tolerance: f64,
    pub max_iterations: Option<usize>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// The engine executable.
    pub program: String,
    /// The engine's scenario configuration.
    pub config: PathBuf,
    /// The lane measurement file name the scenario writes.
    pub lane_data: String,
    /// Simulated end time in s.
    pub end_time: f64,
    pub extra_args: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            network: "network.json".into(),
            routes: Default::default(),
            capacity: Default::default(),
            assignment: Default::default(),
            analysis: Default::default(),
            simulation: Default::default(),
            stopping: Default::default(),
        }
    }
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            path: "routes.xml".into(),
            filter: Default::default(),
        }
    }
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        Self {
            target_ratio: 0.5875,
            on_no_solution: Default::default(),
            tolerance: 1e-12,
            max_iterations: None,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            program: "sumo".into(),
            config: "scenario.sumocfg".into(),
            lane_data: "lane.xml".into(),
            end_time: 50400.0,
            extra_args: vec![],
        }
    }
}

impl Config {
    /// Loads a TOML config. Relative paths are taken relative to the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.network);
        resolve(&mut self.routes.path);
        resolve(&mut self.simulation.config);
        if let Some(table) = &mut self.capacity.table {
            resolve(table);
        }
    }
}
