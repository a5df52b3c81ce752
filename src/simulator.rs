//! The boundary to the external micro-simulation engine.

use crate::error::{Error, Result};
use crate::measurements::LaneDataLog;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Name of the file an engine wrapper may create to signal a finished run.
pub const COMPLETION_MARKER: &str = ".complete";

/// A request to simulate one calibration iteration.
#[derive(Clone, Copy, Debug)]
pub struct SimulationRequest<'a> {
    pub iter_idx: usize,
    /// The root output directory; each iteration writes to its own subdirectory.
    pub output_dir: &'a Path,
    /// Simulated end time in s.
    pub end_time: f64,
}

impl SimulationRequest<'_> {
    pub fn iteration_dir(&self) -> PathBuf {
        iteration_dir(self.output_dir, self.iter_idx)
    }
}

/// The verified output of a simulation run.
#[derive(Clone, Debug)]
pub struct SimulationOutput {
    pub dir: PathBuf,
    pub lane_data: LaneDataLog,
}

/// A micro-simulation engine. `run` blocks until the engine finishes.
pub trait Simulator {
    fn run(&mut self, request: &SimulationRequest) -> Result<SimulationOutput>;
}

impl<S: Simulator + ?Sized> Simulator for Box<S> {
    fn run(&mut self, request: &SimulationRequest) -> Result<SimulationOutput> {
        (**self).run(request)
    }
}

/// The directory an iteration writes to, `output_dir/iter_{idx:03}`.
pub fn iteration_dir(output_dir: &Path, iter_idx: usize) -> PathBuf {
    output_dir.join(format!("iter_{iter_idx:03}"))
}

/// Reads the lane log of a finished run, refusing output that never reached the end time.
pub fn verify_completion(dir: &Path, lane_data_file: &str, end_time: f64) -> Result<LaneDataLog> {
    let path = dir.join(lane_data_file);
    if !path.exists() {
        return Err(Error::ExternalProcess(format!(
            "lane data {} was not written",
            path.display()
        )));
    }
    let log = LaneDataLog::load(&path)?;
    if dir.join(COMPLETION_MARKER).exists() || log.reached(end_time) {
        Ok(log)
    } else {
        Err(Error::ExternalProcess(format!(
            "{} ends at {:?}, before the end time {end_time}",
            path.display(),
            log.last_end
        )))
    }
}

/// Removes the completion marker and lane log of an earlier attempt, so that
/// only the coming run can vouch for its own output.
fn clear_previous_output(dir: &Path, lane_data_file: &str) -> Result<()> {
    for path in [dir.join(COMPLETION_MARKER), dir.join(lane_data_file)] {
        match std::fs::remove_file(&path) {
            Ok(()) => log::debug!("Removed stale {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Runs the engine as a child process.
#[derive(Clone, Debug)]
pub struct SumoProcess {
    /// The engine executable.
    pub program: String,
    /// The engine's scenario configuration.
    pub config: PathBuf,
    /// The file name of the lane measurement output within the iteration directory.
    pub lane_data_file: String,
    pub extra_args: Vec<String>,
}

impl Simulator for SumoProcess {
    fn run(&mut self, request: &SimulationRequest) -> Result<SimulationOutput> {
        let dir = request.iteration_dir();
        std::fs::create_dir_all(&dir)?;
        clear_previous_output(&dir, &self.lane_data_file)?;

        let mut cmd = Command::new(&self.program);
        cmd.arg("-c")
            .arg(&self.config)
            .arg("--output-prefix")
            .arg(format!("{}/", dir.display()))
            .arg("--end")
            .arg(request.end_time.to_string())
            .args(&self.extra_args);
        log::info!("Start running simulation: {cmd:?}");

        let status = cmd
            .status()
            .map_err(|e| Error::ExternalProcess(format!("failed to start {}: {e}", self.program)))?;
        if !status.success() {
            return Err(Error::ExternalProcess(format!(
                "{} exited with {status}",
                self.program
            )));
        }
        log::info!("Simulation finished");

        let lane_data = verify_completion(&dir, &self.lane_data_file, request.end_time)?;
        Ok(SimulationOutput { dir, lane_data })
    }
}

/// Reuses the output of an earlier run of the same iteration instead of simulating.
#[derive(Clone, Debug)]
pub struct ReplayOutput {
    pub lane_data_file: String,
}

impl Simulator for ReplayOutput {
    fn run(&mut self, request: &SimulationRequest) -> Result<SimulationOutput> {
        let dir = request.iteration_dir();
        log::info!("Reusing simulation output in {}", dir.display());
        let lane_data = verify_completion(&dir, &self.lane_data_file, request.end_time)?;
        Ok(SimulationOutput { dir, lane_data })
    }
}
