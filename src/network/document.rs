//! Serialized form of the network definition.

use serde::{Deserialize, Serialize};

/// Default lane speed limit in m/s when the file omits one.
const DEFAULT_SPEED: f64 = 13.89;

/// The network definition as produced by the network conversion tool.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NetworkDocument {
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
    #[serde(default)]
    pub connections: Vec<ConnectionRecord>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    /// The control type name, e.g. `traffic_light`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<ProgramRecord>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProgramRecord {
    pub phases: Vec<PhaseRecord>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub duration: f64,
    pub state: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub id: String,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub priority: i32,
    pub lanes: Vec<LaneRecord>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LaneRecord {
    pub id: String,
    /// Overrides the length derived from `shape`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<f64>,
    #[serde(default = "default_speed")]
    pub speed: f64,
    #[serde(default)]
    pub shape: Vec<[f64; 2]>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionRecord {
    /// The lane id the connection leaves from.
    pub from: String,
    /// The lane id the connection enters.
    pub to: String,
    #[serde(
        default,
        rename = "linkIndex",
        skip_serializing_if = "Option::is_none"
    )]
    pub link_index: Option<usize>,
}

fn default_speed() -> f64 {
    DEFAULT_SPEED
}
