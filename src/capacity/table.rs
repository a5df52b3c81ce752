use super::CapacityEstimate;
use crate::error::Result;
use crate::network::ControlType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// One row of the external capacity table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CapacityEntry {
    pub lane_id: String,
    /// Capacity in veh/h. Falls back to the rule-based estimate when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<f64>,
    /// Manual multiplier applied on top of the capacity.
    #[serde(default = "one")]
    pub manual_adjustment: f64,
    /// Importance of the lane in the assignment objective.
    #[serde(default = "one")]
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control: Option<ControlType>,
    /// Largest volume seen on the lane in simulation, in veh/h.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_volume: Option<f64>,
}

fn one() -> f64 {
    1.0
}

/// Per-lane capacity, manual multiplier and objective weight.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CapacityTable {
    entries: Vec<CapacityEntry>,
}

/// The effective capacity and weight of a lane after merging the table
/// with the rule-based estimate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LaneParameters {
    /// Capacity in veh/h; zero when nothing is known about the lane.
    pub capacity: f64,
    pub weight: f64,
}

impl CapacityTable {
    pub fn new(entries: Vec<CapacityEntry>) -> Self {
        Self { entries }
    }

    /// Exports a rule-based estimate as a table with neutral multipliers.
    pub fn from_estimate(estimate: &CapacityEstimate) -> Self {
        let entries = estimate
            .iter_sorted()
            .map(|(lane_id, c)| CapacityEntry {
                lane_id: lane_id.to_string(),
                capacity: Some(c.capacity),
                manual_adjustment: 1.0,
                weight: 1.0,
                control: Some(c.control),
                observed_volume: None,
            })
            .collect();
        Self { entries }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let entries: Vec<CapacityEntry> = serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(Self { entries })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), &self.entries)?;
        Ok(())
    }

    pub fn entries(&self) -> &[CapacityEntry] {
        &self.entries
    }

    pub fn get(&self, lane_id: &str) -> Option<&CapacityEntry> {
        self.entries.iter().find(|e| e.lane_id == lane_id)
    }

    /// Records observed volumes against matching entries.
    pub fn set_observed(&mut self, observed: &HashMap<String, f64>) {
        for entry in &mut self.entries {
            entry.observed_volume = observed.get(&entry.lane_id).copied();
        }
    }

    /// Merges the table over a rule-based estimate for the given lanes, in order.
    /// Lanes unknown to both get zero capacity and unit weight.
    pub fn merge(&self, estimate: &CapacityEstimate, lane_ids: &[String]) -> Vec<LaneParameters> {
        let by_lane = self
            .entries
            .iter()
            .map(|e| (e.lane_id.as_str(), e))
            .collect::<HashMap<_, _>>();

        lane_ids
            .iter()
            .map(|lane_id| {
                let entry = by_lane.get(lane_id.as_str());
                let base = entry
                    .and_then(|e| e.capacity)
                    .or_else(|| estimate.capacity(lane_id));
                let Some(base) = base else {
                    log::debug!("No capacity known for lane {lane_id}");
                    return LaneParameters {
                        capacity: 0.0,
                        weight: entry.map_or(1.0, |e| e.weight),
                    };
                };
                let adjustment = entry.map_or(1.0, |e| e.manual_adjustment);
                LaneParameters {
                    capacity: (base * adjustment).max(0.0),
                    weight: entry.map_or(1.0, |e| e.weight),
                }
            })
            .collect()
    }
}
