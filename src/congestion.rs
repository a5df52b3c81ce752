//! Aggregation of simulated lane measurements into a congestion ranking.

use crate::measurements::LaneMeasurement;
use crate::network::NetworkModel;
use crate::util::natural_cmp;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Parameters of the congestion analysis.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisParams {
    /// Measurements ending at or before this time in s are discarded.
    pub warm_up: f64,
    /// The aggregation period of the measurement log in s.
    pub period: f64,
    /// The metric lanes are ranked by.
    pub metric: CongestionMetric,
    /// The number of lanes highlighted as bottlenecks.
    pub top_n: usize,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            warm_up: 3600.0,
            period: 300.0,
            metric: CongestionMetric::RelativeSpeed,
            top_n: 5,
        }
    }
}

/// A per-lane congestion metric.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CongestionMetric {
    Speed,
    RelativeSpeed,
    Occupancy,
    Density,
    SampledSeconds,
    WaitingTime,
    TimeLoss,
    TotalTravelDistance,
}

impl CongestionMetric {
    /// Whether low values indicate congestion.
    fn ascending(self) -> bool {
        matches!(self, CongestionMetric::Speed | CongestionMetric::RelativeSpeed)
    }
}

impl FromStr for CongestionMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "speed" => CongestionMetric::Speed,
            "relative_speed" | "speedRelative" => CongestionMetric::RelativeSpeed,
            "occupancy" => CongestionMetric::Occupancy,
            "density" | "laneDensity" => CongestionMetric::Density,
            "sampled_seconds" | "sampledSeconds" => CongestionMetric::SampledSeconds,
            "waiting_time" | "waitingTime" => CongestionMetric::WaitingTime,
            "time_loss" | "timeLoss" => CongestionMetric::TimeLoss,
            "total_travel_distance" => CongestionMetric::TotalTravelDistance,
            _ => return Err(format!("unknown congestion metric `{s}`")),
        })
    }
}

/// Aggregated congestion metrics of one lane.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LaneCongestion {
    pub lane_id: String,
    /// Whether any vehicle was sampled on the lane. The volume-weighted
    /// metrics of an idle lane are zero and carry no information.
    pub observed: bool,
    pub speed: f64,
    pub speed_relative: f64,
    pub occupancy: f64,
    pub density: f64,
    pub sampled_seconds: f64,
    pub waiting_time: f64,
    pub time_loss: f64,
    pub total_travel_distance: f64,
}

impl LaneCongestion {
    pub fn metric(&self, metric: CongestionMetric) -> f64 {
        match metric {
            CongestionMetric::Speed => self.speed,
            CongestionMetric::RelativeSpeed => self.speed_relative,
            CongestionMetric::Occupancy => self.occupancy,
            CongestionMetric::Density => self.density,
            CongestionMetric::SampledSeconds => self.sampled_seconds,
            CongestionMetric::WaitingTime => self.waiting_time,
            CongestionMetric::TimeLoss => self.time_loss,
            CongestionMetric::TotalTravelDistance => self.total_travel_distance,
        }
    }
}

/// Running sums for one lane. Speeds and occupancy are weighted by the mean
/// number of vehicles present (`sampled_seconds / period`); the other metrics
/// are plain means over intervals.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LaneAccumulator {
    weight: f64,
    speed: f64,
    speed_relative: f64,
    occupancy: f64,
    density: f64,
    sampled_seconds: f64,
    waiting_time: f64,
    time_loss: f64,
    total_travel_distance: f64,
    count: usize,
}

impl LaneAccumulator {
    pub fn push(&mut self, m: &LaneMeasurement, period: f64) {
        let weight = m.sampled_seconds / period;
        self.weight += weight;
        self.speed += weight * m.speed;
        self.speed_relative += weight * m.speed_relative;
        self.occupancy += weight * m.occupancy;
        self.density += m.density;
        self.sampled_seconds += m.sampled_seconds;
        self.waiting_time += m.waiting_time;
        self.time_loss += m.time_loss;
        self.total_travel_distance += m.sampled_seconds * m.speed;
        self.count += 1;
    }

    pub fn merge(&mut self, other: &Self) {
        self.weight += other.weight;
        self.speed += other.speed;
        self.speed_relative += other.speed_relative;
        self.occupancy += other.occupancy;
        self.density += other.density;
        self.sampled_seconds += other.sampled_seconds;
        self.waiting_time += other.waiting_time;
        self.time_loss += other.time_loss;
        self.total_travel_distance += other.total_travel_distance;
        self.count += other.count;
    }

    /// The number of intervals aggregated.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn summary(&self, lane_id: &str) -> LaneCongestion {
        let weighted = |sum: f64| if self.weight > 0.0 { sum / self.weight } else { 0.0 };
        let mean = |sum: f64| {
            if self.count > 0 {
                sum / self.count as f64
            } else {
                0.0
            }
        };
        LaneCongestion {
            lane_id: lane_id.to_string(),
            observed: self.weight > 0.0,
            speed: weighted(self.speed),
            speed_relative: weighted(self.speed_relative),
            occupancy: weighted(self.occupancy),
            density: mean(self.density),
            sampled_seconds: mean(self.sampled_seconds),
            waiting_time: mean(self.waiting_time),
            time_loss: mean(self.time_loss),
            total_travel_distance: mean(self.total_travel_distance),
        }
    }
}

/// Per-lane accumulators over a set of measurements. Aggregates of disjoint
/// windows can be merged.
#[derive(Clone, Debug, Default)]
pub struct CongestionAggregate {
    lanes: HashMap<String, LaneAccumulator>,
}

impl CongestionAggregate {
    pub fn merge(&mut self, other: &CongestionAggregate) {
        for (lane_id, acc) in &other.lanes {
            self.lanes.entry(lane_id.clone()).or_default().merge(acc);
        }
    }

    pub fn get(&self, lane_id: &str) -> Option<LaneCongestion> {
        self.lanes.get(lane_id).map(|acc| acc.summary(lane_id))
    }

    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    /// Lane summaries ordered most congested first by the given metric.
    /// Idle lanes follow every observed lane.
    pub fn rank(&self, metric: CongestionMetric) -> Vec<LaneCongestion> {
        let mut ranked = self
            .lanes
            .iter()
            .map(|(lane_id, acc)| acc.summary(lane_id))
            .collect::<Vec<_>>();
        ranked.sort_by(|a, b| {
            let (x, y) = (a.metric(metric), b.metric(metric));
            let ord = if metric.ascending() {
                x.total_cmp(&y)
            } else {
                y.total_cmp(&x)
            };
            b.observed
                .cmp(&a.observed)
                .then(ord)
                .then_with(|| natural_cmp(&a.lane_id, &b.lane_id))
        });
        ranked
    }
}

/// One row of the bottleneck report.
#[derive(Clone, Debug, Serialize)]
pub struct BottleneckRow {
    pub lane_id: String,
    /// Realized volume/capacity ratio of the assignment.
    pub vc_ratio: f64,
    pub congestion: LaneCongestion,
    /// Lane length in m.
    pub length: f64,
    /// Assigned volume in veh/h.
    pub volume: f64,
    /// Capacity in veh/h.
    pub capacity: f64,
}

/// Discards warm-up measurements, aggregates per lane and ranks by congestion.
#[derive(Clone, Copy, Debug, Default)]
pub struct CongestionAnalyzer {
    params: AnalysisParams,
}

impl CongestionAnalyzer {
    pub fn new(params: AnalysisParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &AnalysisParams {
        &self.params
    }

    /// Aggregates the measurements that end after the warm-up.
    pub fn aggregate<'a>(&self, records: impl IntoIterator<Item = &'a LaneMeasurement>) -> CongestionAggregate {
        let mut aggregate = CongestionAggregate::default();
        for record in records {
            if record.window.max <= self.params.warm_up {
                continue;
            }
            aggregate
                .lanes
                .entry(record.lane_id.clone())
                .or_default()
                .push(record, self.params.period);
        }
        aggregate
    }

    /// Ranks the lanes and joins each with its capacity, assigned volume and ratio.
    /// Lanes missing from `capacities` or `ratios` get zero.
    pub fn analyze<'a>(
        &self,
        records: impl IntoIterator<Item = &'a LaneMeasurement>,
        network: &NetworkModel,
        capacities: &HashMap<&str, f64>,
        ratios: &HashMap<&str, f64>,
    ) -> Vec<BottleneckRow> {
        self.aggregate(records)
            .rank(self.params.metric)
            .into_iter()
            .map(|congestion| {
                let lane_id = congestion.lane_id.as_str();
                let capacity = capacities.get(lane_id).copied().unwrap_or_else(|| {
                    log::debug!("No capacity for measured lane {lane_id}");
                    0.0
                });
                let vc_ratio = ratios.get(lane_id).copied().unwrap_or(0.0);
                let length = network.lane(lane_id).map_or(0.0, |lane| lane.length());
                BottleneckRow {
                    lane_id: congestion.lane_id.clone(),
                    vc_ratio,
                    length,
                    volume: capacity * vc_ratio,
                    capacity,
                    congestion,
                }
            })
            .collect()
    }
}
