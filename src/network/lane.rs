use crate::math::Point2d;
use crate::{EdgeId, LaneId, NodeId};
use smallvec::SmallVec;

/// A directed road between two junctions.
#[derive(Clone, Debug)]
pub struct Edge {
    /// The edge key.
    pub(crate) key: EdgeId,
    /// The external edge id.
    pub(crate) id: String,
    /// The priority rank used by unsignalized junctions.
    pub(crate) priority: i32,
    /// The junction the edge starts at.
    pub(crate) from: NodeId,
    /// The junction the edge ends at.
    pub(crate) to: NodeId,
    /// The lanes, ordered right to left.
    pub(crate) lanes: SmallVec<[LaneId; 4]>,
}

/// A lane represents a single lane of traffic along an edge.
#[derive(Clone, Debug)]
pub struct Lane {
    /// The lane key.
    pub(crate) key: LaneId,
    /// The external lane id.
    pub(crate) id: String,
    /// The edge the lane belongs to.
    pub(crate) edge: EdgeId,
    /// The length of the lane in m.
    pub(crate) length: f64,
    /// Speed limit in m/s.
    pub(crate) speed: f64,
    /// The centre line of the lane.
    pub(crate) shape: Vec<Point2d>,
    /// The lanes that precede this one.
    pub(crate) links_in: SmallVec<[LaneId; 4]>,
    /// The lanes that succeed this one.
    pub(crate) links_out: SmallVec<[LaneId; 4]>,
}

/// A permitted lane-to-lane transition at a junction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Connection {
    pub from: LaneId,
    pub to: LaneId,
    /// The index of the connection within its junction's signal program.
    pub link_index: Option<usize>,
}

impl Edge {
    pub fn key(&self) -> EdgeId {
        self.key
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn from(&self) -> NodeId {
        self.from
    }

    pub fn to(&self) -> NodeId {
        self.to
    }

    pub fn lanes(&self) -> &[LaneId] {
        &self.lanes
    }
}

impl Lane {
    pub fn key(&self) -> LaneId {
        self.key
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The edge the lane belongs to.
    pub fn edge(&self) -> EdgeId {
        self.edge
    }

    /// Gets the length of the lane in m.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Gets the speed limit in m/s.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn shape(&self) -> &[Point2d] {
        &self.shape
    }

    /// The lanes this lane connects into.
    pub fn links_out(&self) -> &[LaneId] {
        &self.links_out
    }

    /// The lanes connecting into this lane.
    pub fn links_in(&self) -> &[LaneId] {
        &self.links_in
    }
}
