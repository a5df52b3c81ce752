use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{debug, error, info};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use traffic_calib::calibration::IterationOutcome;
use traffic_calib::capacity::observed_max_volume;
use traffic_calib::{
    estimate_capacity, CalibrationLoop, CapacityTable, Config, LaneDataLog, NetworkModel, ReplayOutput,
    Simulator, SumoProcess,
};

#[derive(Parser)]
#[command(name = "traffic-calib")]
#[command(about = "Lane capacity calibration and route demand assignment", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one calibration iteration
    Iterate {
        /// Calibration config file
        #[arg(long, default_value = "calibration.toml")]
        config: PathBuf,
        /// Root directory for iteration outputs
        #[arg(long, default_value = "outputs/calibration")]
        output_dir: PathBuf,
        /// Iteration index
        #[arg(long)]
        iter_idx: usize,
        /// Simulated end time in s [default: from config, 50400]
        #[arg(long)]
        end_time: Option<f64>,
        /// Reuse the existing simulation output of this iteration instead of running the engine
        #[arg(long)]
        dry_run: bool,
    },
    /// Export the rule-based capacity table
    Capacity {
        /// Calibration config file
        #[arg(long, default_value = "calibration.toml")]
        config: PathBuf,
        /// Output capacity table (JSON)
        #[arg(long)]
        output: PathBuf,
        /// Lane data logs to derive observed volumes from
        #[arg(long)]
        lane_data: Vec<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .init();

    if let Err(e) = run(cli.command) {
        error!("{e:#}");
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Iterate {
            config,
            output_dir,
            iter_idx,
            end_time,
            dry_run,
        } => {
            let config = load_config(&config)?;
            let network = load_network(&config)?;
            let simulator: Box<dyn Simulator> = if dry_run {
                Box::new(ReplayOutput {
                    lane_data_file: config.simulation.lane_data.clone(),
                })
            } else {
                Box::new(SumoProcess {
                    program: config.simulation.program.clone(),
                    config: config.simulation.config.clone(),
                    lane_data_file: config.simulation.lane_data.clone(),
                    extra_args: config.simulation.extra_args.clone(),
                })
            };

            let mut calibration = CalibrationLoop::new(&network, &config, simulator, &output_dir);
            if let Some(end_time) = end_time {
                calibration = calibration.with_end_time(end_time);
            }
            let outcome = calibration
                .run_iteration(iter_idx)
                .with_context(|| format!("iteration {iter_idx} failed"))?;

            match outcome {
                IterationOutcome::Completed(summary) => {
                    info!(
                        "Iteration {} written to {}; decision: {:?}",
                        summary.iter_idx,
                        summary.dir.display(),
                        summary.decision
                    );
                }
                IterationOutcome::NoSolution { iter_idx, status } => {
                    info!("Iteration {iter_idx} has no assignment ({status}); demand unchanged");
                }
            }
        }
        Commands::Capacity {
            config,
            output,
            lane_data,
        } => {
            let config = load_config(&config)?;
            let network = load_network(&config)?;
            let estimate = estimate_capacity(&network, &config.capacity.params)?;
            for (control, lanes) in estimate.lanes_by_control() {
                debug!("{control}: {} lanes", lanes.len());
            }
            let mut table = CapacityTable::from_estimate(&estimate);

            if !lane_data.is_empty() {
                let mut observed = HashMap::<String, f64>::new();
                for path in &lane_data {
                    let lane_log = LaneDataLog::load(path)
                        .with_context(|| format!("failed to read lane data {}", path.display()))?;
                    for (lane_id, volume) in observed_max_volume(&lane_log.records, config.analysis.warm_up) {
                        let max = observed.entry(lane_id).or_insert(volume);
                        *max = max.max(volume);
                    }
                }
                table.set_observed(&observed);
            }

            table
                .save(&output)
                .with_context(|| format!("failed to write {}", output.display()))?;
            info!("Wrote {} lane capacities to {}", estimate.len(), output.display());
        }
    }
    Ok(())
}

fn load_config(path: &Path) -> Result<Config> {
    Config::load(path).with_context(|| format!("failed to load config {}", path.display()))
}

fn load_network(config: &Config) -> Result<NetworkModel> {
    NetworkModel::load(&config.network)
        .with_context(|| format!("failed to load network {}", config.network.display()))
}
