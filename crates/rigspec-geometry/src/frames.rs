//! Datum frame graph.
//!
//! Every datum frame is declared relative to one parent frame; the chain of
//! parents must end in [`WORLD`].  [`FrameGraph::world_pose`] composes the
//! chain into a single isometry that maps frame-local points into world
//! coordinates.
//!
//! # Example
//!
//! ```rust
//! use nalgebra::Point3;
//! use rigspec_geometry::frames::{isometry_from, FrameGraph, WORLD};
//!
//! let mut frames = FrameGraph::new();
//! frames.insert("chassis", WORLD, isometry_from([100.0, 0.0, 0.0], [0.0, 0.0, 0.0]));
//! frames.insert("hip_fl", "chassis", isometry_from([50.0, 0.0, 0.0], [0.0, 0.0, 0.0]));
//!
//! let p = frames.to_world("hip_fl", Point3::origin()).unwrap();
//! assert!((p.x - 150.0).abs() < 1e-9);
//! ```

use std::collections::{BTreeMap, BTreeSet};

use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion};
use rigspec_params::ParameterSet;
use rigspec_types::ConfigError;
use tracing::debug;

/// Name of the root frame.
pub const WORLD: &str = "world";

/// Build an isometry from an origin (mm) and roll/pitch/yaw (degrees).
pub fn isometry_from(origin: [f64; 3], rpy_deg: [f64; 3]) -> Isometry3<f64> {
    Isometry3::from_parts(
        Translation3::new(origin[0], origin[1], origin[2]),
        UnitQuaternion::from_euler_angles(
            rpy_deg[0].to_radians(),
            rpy_deg[1].to_radians(),
            rpy_deg[2].to_radians(),
        ),
    )
}

#[derive(Debug, Clone, PartialEq)]
struct FrameEdge {
    parent: String,
    offset: Isometry3<f64>,
}

/// A tree of named datum frames rooted at [`WORLD`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameGraph {
    frames: BTreeMap<String, FrameEdge>,
}

impl FrameGraph {
    /// Create a graph holding only the world frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph from every datum-frame interface of a parameter set.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownFrame`] when a frame's parent chain does not
    /// reach the world frame.
    pub fn from_parameters(params: &ParameterSet) -> Result<Self, ConfigError> {
        let mut graph = Self::new();
        for spec in params.interfaces().values() {
            if let Some(datum) = spec.datum_frame() {
                graph.insert(&spec.name, &datum.parent, isometry_from(datum.origin, datum.rpy));
            }
        }
        for name in graph.frames.keys() {
            graph.world_pose(name)?;
        }
        debug!(frames = graph.frames.len(), "frame graph built");
        Ok(graph)
    }

    /// Register or update the pose of `name` relative to `parent`.
    pub fn insert(&mut self, name: &str, parent: &str, offset: Isometry3<f64>) {
        self.frames.insert(
            name.to_string(),
            FrameEdge {
                parent: parent.to_string(),
                offset,
            },
        );
    }

    pub fn contains(&self, name: &str) -> bool {
        name == WORLD || self.frames.contains_key(name)
    }

    /// Frame names in order, world excluded.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.frames.keys().map(String::as_str)
    }

    /// Pose of `name` in world coordinates.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownFrame`] for an undeclared frame, a dangling
    /// parent, or a parent cycle.
    pub fn world_pose(&self, name: &str) -> Result<Isometry3<f64>, ConfigError> {
        let mut pose = Isometry3::identity();
        let mut current = name;
        let mut visited = BTreeSet::new();
        while current != WORLD {
            if !visited.insert(current) {
                return Err(ConfigError::UnknownFrame(format!("{name} (parent cycle at {current})")));
            }
            let edge = self
                .frames
                .get(current)
                .ok_or_else(|| ConfigError::UnknownFrame(current.to_string()))?;
            pose = edge.offset * pose;
            current = &edge.parent;
        }
        Ok(pose)
    }

    /// Transform that maps points expressed in `target` into `source`.
    pub fn lookup(&self, source: &str, target: &str) -> Result<Isometry3<f64>, ConfigError> {
        Ok(self.world_pose(source)?.inverse() * self.world_pose(target)?)
    }

    /// Map a frame-local point into world coordinates.
    pub fn to_world(&self, frame: &str, local: Point3<f64>) -> Result<Point3<f64>, ConfigError> {
        Ok(self.world_pose(frame)? * local)
    }
}
