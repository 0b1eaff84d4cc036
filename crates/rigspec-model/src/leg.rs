//! Legs, joints and stances.
//!
//! Each leg is a three-joint chain mounted on a datum frame: a coxa joint
//! about the vertical axis, then femur and tibia joints about horizontal
//! axes.  A [`Stance`] fixes the joint angles of every leg and says which
//! legs are lifted; the supporting feet form the support polygon.
//!
//! Angles are degrees.  The femur angle is measured up from horizontal; the
//! tibia angle is the knee bend relative to the femur, so the tibia points
//! along `femur − tibia`.

use std::collections::{BTreeMap, BTreeSet};

use nalgebra::{Point3, UnitQuaternion, Vector3};
use rigspec_geometry::FrameGraph;
use rigspec_params::ParameterSet;
use rigspec_types::ConfigError;
use serde::{Deserialize, Serialize};

/// A joint of a leg, in chain order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Joint {
    Coxa,
    Femur,
    Tibia,
}

impl Joint {
    pub const ALL: [Joint; 3] = [Joint::Coxa, Joint::Femur, Joint::Tibia];

    pub fn index(self) -> usize {
        match self {
            Joint::Coxa => 0,
            Joint::Femur => 1,
            Joint::Tibia => 2,
        }
    }

    /// True for joints whose axis is vertical; they carry no static
    /// gravity torque.
    pub fn is_vertical(self) -> bool {
        self == Joint::Coxa
    }
}

impl std::fmt::Display for Joint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Joint::Coxa => write!(f, "coxa"),
            Joint::Femur => write!(f, "femur"),
            Joint::Tibia => write!(f, "tibia"),
        }
    }
}

/// Joint angles of one leg, degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct JointAngles {
    pub coxa: f64,
    pub femur: f64,
    pub tibia: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Leg {
    pub id: String,
    /// Datum frame at the hip.
    pub mount: String,
    /// Heading of the leg's neutral direction about the mount's Z, degrees.
    pub yaw: f64,
    /// Segment lengths, mm.
    pub coxa: f64,
    pub femur: f64,
    pub tibia: f64,
    /// Actuator names for coxa, femur and tibia.
    pub actuators: [String; 3],
}

impl Leg {
    /// Foot position in the mount frame.
    pub fn foot_local(&self, a: &JointAngles) -> Point3<f64> {
        let (reach, height) = self.planar_foot(a);
        let heading = UnitQuaternion::from_euler_angles(0.0, 0.0, (self.yaw + a.coxa).to_radians());
        Point3::from(heading * Vector3::new(reach, 0.0, height))
    }

    /// Foot position in world coordinates.
    pub fn foot_position(&self, a: &JointAngles, frames: &FrameGraph) -> Result<Point3<f64>, ConfigError> {
        frames.to_world(&self.mount, self.foot_local(a))
    }

    /// Horizontal distance from each joint axis to the foot contact, mm.
    ///
    /// The coxa axis is vertical, so its gravity moment arm is zero.
    pub fn joint_moment_arms(&self, a: &JointAngles) -> [f64; 3] {
        let femur = a.femur.to_radians();
        let tibia = (a.femur - a.tibia).to_radians();
        let tibia_arm = (self.tibia * tibia.cos()).abs();
        let femur_arm = (self.femur * femur.cos() + self.tibia * tibia.cos()).abs();
        [0.0, femur_arm, tibia_arm]
    }

    pub fn actuator(&self, joint: Joint) -> &str {
        &self.actuators[joint.index()]
    }

    /// (reach from the coxa axis, height relative to the hip), mm.
    fn planar_foot(&self, a: &JointAngles) -> (f64, f64) {
        let femur = a.femur.to_radians();
        let tibia = (a.femur - a.tibia).to_radians();
        (
            self.coxa + self.femur * femur.cos() + self.tibia * tibia.cos(),
            self.femur * femur.sin() + self.tibia * tibia.sin(),
        )
    }
}

/// Leg description using parameter keys.
#[derive(Debug, Clone)]
pub struct LegBuilder {
    id: String,
    mount: String,
    yaw: Option<String>,
    lengths: [String; 3],
    actuators: [String; 3],
}

impl LegBuilder {
    /// `lengths` are the coxa, femur and tibia length keys.
    pub fn new(id: impl Into<String>, mount: &str, lengths: [&str; 3]) -> Self {
        Self {
            id: id.into(),
            mount: mount.to_string(),
            yaw: None,
            lengths: lengths.map(str::to_string),
            actuators: [String::new(), String::new(), String::new()],
        }
    }

    pub fn yaw(mut self, key: &str) -> Self {
        self.yaw = Some(key.to_string());
        self
    }

    /// Actuator names for coxa, femur and tibia.
    pub fn actuators(mut self, names: [&str; 3]) -> Self {
        self.actuators = names.map(str::to_string);
        self
    }

    pub fn build(&self, params: &ParameterSet, frames: &FrameGraph) -> Result<Leg, ConfigError> {
        if !frames.contains(&self.mount) {
            return Err(ConfigError::UnknownFrame(self.mount.clone()));
        }
        for name in &self.actuators {
            params.actuator(name)?;
        }
        Ok(Leg {
            id: self.id.clone(),
            mount: self.mount.clone(),
            yaw: match &self.yaw {
                Some(key) => params.number(key)?,
                None => 0.0,
            },
            coxa: params.number(&self.lengths[0])?,
            femur: params.number(&self.lengths[1])?,
            tibia: params.number(&self.lengths[2])?,
            actuators: self.actuators.clone(),
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stance
// ────────────────────────────────────────────────────────────────────────────

/// Named pose: joint angles per leg and the set of lifted legs.
#[derive(Debug, Clone, PartialEq)]
pub struct Stance {
    pub name: String,
    pub angles: BTreeMap<String, JointAngles>,
    pub lifted: BTreeSet<String>,
}

impl Stance {
    pub fn is_supporting(&self, leg: &str) -> bool {
        !self.lifted.contains(leg)
    }

    pub fn angles(&self, leg: &str) -> Option<&JointAngles> {
        self.angles.get(leg)
    }
}

/// Stance description; angles are read from
/// `dimensions.stance.<stance>.<leg>.{coxa,femur,tibia}`.
#[derive(Debug, Clone)]
pub struct StanceBuilder {
    name: String,
    lifted: BTreeSet<String>,
}

impl StanceBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lifted: BTreeSet::new(),
        }
    }

    pub fn lift(mut self, leg: &str) -> Self {
        self.lifted.insert(leg.to_string());
        self
    }

    /// Resolve angles for every leg.  Supporting legs must declare all
    /// three angles; lifted legs may omit them.
    pub fn build(&self, params: &ParameterSet, legs: &[Leg]) -> Result<Stance, ConfigError> {
        if let Some(unknown) = self.lifted.iter().find(|l| !legs.iter().any(|leg| &leg.id == *l)) {
            return Err(ConfigError::Validation {
                issues: vec![format!("stance '{}': lifted leg '{unknown}' does not exist", self.name)],
            });
        }
        let mut angles = BTreeMap::new();
        for leg in legs {
            let key = |joint: Joint| format!("dimensions.stance.{}.{}.{joint}", self.name, leg.id);
            let read = |joint: Joint| params.number(&key(joint));
            if self.lifted.contains(&leg.id) && !params.contains(&key(Joint::Coxa)) {
                continue;
            }
            angles.insert(
                leg.id.clone(),
                JointAngles {
                    coxa: read(Joint::Coxa)?,
                    femur: read(Joint::Femur)?,
                    tibia: read(Joint::Tibia)?,
                },
            );
        }
        Ok(Stance {
            name: self.name.clone(),
            angles,
            lifted: self.lifted.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rigspec_geometry::{WORLD, isometry_from};

    fn leg() -> Leg {
        Leg {
            id: "fl".into(),
            mount: "hip_fl".into(),
            yaw: 0.0,
            coxa: 50.0,
            femur: 200.0,
            tibia: 250.0,
            actuators: ["hip_yaw".into(), "hip_pitch".into(), "knee".into()],
        }
    }

    #[test]
    fn straight_leg_reaches_full_length() {
        let p = leg().foot_local(&JointAngles::default());
        assert_relative_eq!(p.x, 500.0, epsilon = 1e-9);
        assert_relative_eq!(p.z, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn vertical_tibia_puts_foot_below_knee() {
        let a = JointAngles {
            coxa: 0.0,
            femur: 0.0,
            tibia: 90.0,
        };
        let p = leg().foot_local(&a);
        assert_relative_eq!(p.x, 250.0, epsilon = 1e-9);
        assert_relative_eq!(p.z, -250.0, epsilon = 1e-9);
        let arms = leg().joint_moment_arms(&a);
        assert_relative_eq!(arms[0], 0.0);
        assert_relative_eq!(arms[1], 200.0, epsilon = 1e-9);
        assert_relative_eq!(arms[2], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn coxa_and_yaw_rotate_the_foot() {
        let mut l = leg();
        l.yaw = 45.0;
        let a = JointAngles {
            coxa: 45.0,
            ..JointAngles::default()
        };
        let p = l.foot_local(&a);
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(p.y, 500.0, epsilon = 1e-9);
    }

    #[test]
    fn foot_position_is_in_world() {
        let mut frames = FrameGraph::new();
        frames.insert("hip_fl", WORLD, isometry_from([200.0, 150.0, 300.0], [0.0; 3]));
        let p = leg().foot_position(&JointAngles::default(), &frames).unwrap();
        assert_relative_eq!(p.x, 700.0, epsilon = 1e-9);
        assert_relative_eq!(p.z, 300.0, epsilon = 1e-9);
    }

    #[test]
    fn foot_position_with_unknown_mount_fails() {
        let frames = FrameGraph::new();
        assert!(leg().foot_position(&JointAngles::default(), &frames).is_err());
    }

    #[test]
    fn joint_display_is_lowercase() {
        let names: Vec<String> = Joint::ALL.iter().map(ToString::to_string).collect();
        assert_eq!(names, ["coxa", "femur", "tibia"]);
        assert!(Joint::Coxa.is_vertical());
        assert!(!Joint::Tibia.is_vertical());
    }
}
