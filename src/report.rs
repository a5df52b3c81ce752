//! Per-iteration tables and plot data.

use crate::assignment::Assignment;
use crate::congestion::BottleneckRow;
use crate::error::Result;
use crate::network::NetworkModel;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The files written for one iteration.
#[derive(Clone, Debug, Default)]
pub struct IterationReport {
    pub table: PathBuf,
    pub plots: Vec<PathBuf>,
}

/// Data for one chart, to be rendered by an external plotting tool.
#[derive(Serialize)]
struct PlotArtifact<T> {
    kind: &'static str,
    title: String,
    x_label: &'static str,
    y_label: &'static str,
    data: T,
}

#[derive(Serialize)]
struct LanePoint<'a> {
    lane_id: &'a str,
    y: f64,
}

#[derive(Serialize)]
struct ScatterPoint<'a> {
    lane_id: &'a str,
    x: f64,
    y: f64,
}

#[derive(Serialize)]
struct LaneShape<'a> {
    lane_id: &'a str,
    shape: Vec<[f64; 2]>,
}

#[derive(Serialize)]
struct BottleneckMap<'a> {
    network: Vec<LaneShape<'a>>,
    highlighted: Vec<LaneShape<'a>>,
}

#[derive(Serialize)]
struct AssignmentChart<'a> {
    target_ratio: f64,
    lanes: Vec<LanePoint<'a>>,
}

/// Writes report artifacts into an iteration directory.
pub struct ReportWriter {
    dir: PathBuf,
    top_n: usize,
}

impl ReportWriter {
    pub fn new(dir: &Path, top_n: usize) -> Self {
        Self {
            dir: dir.to_path_buf(),
            top_n,
        }
    }

    /// Writes the lane table and every plot for an iteration.
    /// `rows` must be ordered most congested first.
    pub fn write(
        &self,
        iter_idx: usize,
        network: &NetworkModel,
        assignment: &Assignment,
        rows: &[BottleneckRow],
    ) -> Result<IterationReport> {
        std::fs::create_dir_all(&self.dir)?;
        let table = self.dir.join("lane_table.csv");
        write_table(&table, rows)?;

        let relative_speed = rows
            .iter()
            .map(|r| (r.lane_id.as_str(), r.congestion.speed_relative))
            .collect::<HashMap<_, _>>();
        // Lanes without measurements count as fully stopped.
        let congestion_of = |lane_id: &str| {
            1.0 - relative_speed.get(lane_id).copied().unwrap_or_else(|| {
                log::debug!("No measurements for lane {lane_id}");
                0.0
            })
        };

        let mut plots = vec![];

        let data = assignment
            .lane_ids
            .iter()
            .map(|id| LanePoint {
                lane_id: id,
                y: congestion_of(id.as_str()),
            })
            .collect::<Vec<_>>();
        plots.push(self.write_plot(
            "relative_speed.json",
            &PlotArtifact {
                kind: "scatter",
                title: format!("Relative speed, iteration {iter_idx}"),
                x_label: "lane id",
                y_label: "1 - relative speed",
                data,
            },
        )?);

        let data = assignment
            .lane_ids
            .iter()
            .zip(&assignment.lane_ratios)
            .map(|(id, ratio)| ScatterPoint {
                lane_id: id,
                x: *ratio,
                y: congestion_of(id.as_str()),
            })
            .collect::<Vec<_>>();
        plots.push(self.write_plot(
            "capacity_ratio_vs_relative_speed.json",
            &PlotArtifact {
                kind: "scatter",
                title: format!("Capacity ratio and relative speed, iteration {iter_idx}"),
                x_label: "capacity ratio",
                y_label: "1 - relative speed",
                data,
            },
        )?);

        let data = AssignmentChart {
            target_ratio: assignment.target_ratio,
            lanes: assignment
                .lane_ids
                .iter()
                .zip(&assignment.lane_ratios)
                .map(|(id, ratio)| LanePoint {
                    lane_id: id,
                    y: *ratio,
                })
                .collect(),
        };
        plots.push(self.write_plot(
            "assignment_ratio.json",
            &PlotArtifact {
                kind: "scatter",
                title: format!("Assigned capacity ratio, iteration {iter_idx}"),
                x_label: "lane id",
                y_label: "capacity ratio",
                data,
            },
        )?);

        let shape_of = |lane_id: &str| {
            network.lane(lane_id).map(|lane| LaneShape {
                lane_id: lane.id(),
                shape: lane.shape().iter().map(|p| [p.x, p.y]).collect(),
            })
        };
        let data = BottleneckMap {
            network: network
                .iter_lanes()
                .filter_map(|lane| shape_of(lane.id()))
                .collect(),
            highlighted: rows
                .iter()
                .take(self.top_n)
                .filter_map(|row| shape_of(row.lane_id.as_str()))
                .collect(),
        };
        plots.push(self.write_plot(
            "bottleneck_map.json",
            &PlotArtifact {
                kind: "map",
                title: format!("Top {} bottleneck lanes, iteration {iter_idx}", self.top_n),
                x_label: "x",
                y_label: "y",
                data,
            },
        )?);

        log::info!("Wrote report for iteration {iter_idx} to {}", self.dir.display());
        Ok(IterationReport { table, plots })
    }

    fn write_plot<T: Serialize>(&self, name: &str, plot: &PlotArtifact<T>) -> Result<PathBuf> {
        let path = self.dir.join(name);
        let file = std::fs::File::create(&path)?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), plot)?;
        Ok(path)
    }
}

/// One line of `lane_table.csv`.
#[derive(Serialize)]
struct TableRow<'a> {
    lane_id: &'a str,
    #[serde(rename = "v/c ratio")]
    vc_ratio: f64,
    speed: f64,
    #[serde(rename = "speedRelative")]
    speed_relative: f64,
    occupancy: f64,
    #[serde(rename = "laneDensity")]
    density: f64,
    #[serde(rename = "sampledSeconds")]
    sampled_seconds: f64,
    #[serde(rename = "waitingTime")]
    waiting_time: f64,
    #[serde(rename = "timeLoss")]
    time_loss: f64,
    total_travel_distance: f64,
    lane_length: f64,
    volume: f64,
    capacity: f64,
}

impl<'a> From<&'a BottleneckRow> for TableRow<'a> {
    fn from(row: &'a BottleneckRow) -> Self {
        let c = &row.congestion;
        Self {
            lane_id: &row.lane_id,
            vc_ratio: row.vc_ratio,
            speed: c.speed,
            speed_relative: c.speed_relative,
            occupancy: c.occupancy,
            density: c.density,
            sampled_seconds: c.sampled_seconds,
            waiting_time: c.waiting_time,
            time_loss: c.time_loss,
            total_travel_distance: c.total_travel_distance,
            lane_length: row.length,
            volume: row.volume,
            capacity: row.capacity,
        }
    }
}

/// Writes the ranked lane table as CSV.
pub fn write_table(path: &Path, rows: &[BottleneckRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(TableRow::from(row))?;
    }
    writer.flush()?;
    Ok(())
}
