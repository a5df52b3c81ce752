use super::signal::SignalProgram;
use crate::math::Point2d;
use crate::{EdgeId, NodeId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The right-of-way rule governing a junction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlType {
    TrafficLight,
    Priority,
    PriorityStop,
    AllwayStop,
    DeadEnd,
}

impl ControlType {
    /// Looks up a control type by its network file name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "traffic_light" => Some(ControlType::TrafficLight),
            "priority" => Some(ControlType::Priority),
            "priority_stop" => Some(ControlType::PriorityStop),
            "allway_stop" => Some(ControlType::AllwayStop),
            "dead_end" => Some(ControlType::DeadEnd),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ControlType::TrafficLight => "traffic_light",
            ControlType::Priority => "priority",
            ControlType::PriorityStop => "priority_stop",
            ControlType::AllwayStop => "allway_stop",
            ControlType::DeadEnd => "dead_end",
        }
    }
}

impl fmt::Display for ControlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A junction in the road network.
#[derive(Clone, Debug)]
pub struct Node {
    pub(crate) key: NodeId,
    pub(crate) id: String,
    pub(crate) control: ControlType,
    pub(crate) program: Option<SignalProgram>,
    pub(crate) coord: Point2d,
    pub(crate) incoming: Vec<EdgeId>,
    pub(crate) outgoing: Vec<EdgeId>,
}

impl Node {
    pub fn key(&self) -> NodeId {
        self.key
    }

    /// The external node id.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn control(&self) -> ControlType {
        self.control
    }

    /// The signal program, for traffic light junctions that define one.
    pub fn program(&self) -> Option<&SignalProgram> {
        self.program.as_ref()
    }

    pub fn coord(&self) -> Point2d {
        self.coord
    }

    /// The edges ending at this node.
    pub fn incoming(&self) -> &[EdgeId] {
        &self.incoming
    }

    /// The edges starting at this node.
    pub fn outgoing(&self) -> &[EdgeId] {
        &self.outgoing
    }
}
