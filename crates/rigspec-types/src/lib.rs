//! `rigspec-types` – shared vocabulary of the rigspec workspace.
//!
//! Every other crate speaks in these types: closed numeric ranges, axes,
//! the error taxonomy, and the [`Verdict`]s / [`ValidationReport`] produced
//! by the invariant gate.
//!
//! # Modules
//!
//! - [`error`] – [`ConfigError`], [`GeometryError`], [`InterfaceMismatch`]
//!   and the umbrella [`RigError`].
//! - [`verdict`] – [`Verdict`], [`VerdictKind`], [`FailureDetail`] and the
//!   aggregate [`ValidationReport`].

pub mod error;
pub mod verdict;

pub use error::{ConfigError, GeometryError, InterfaceMismatch, RigError};
pub use verdict::{
    CableOffender, CheckId, FailureDetail, HolePair, ValidationReport, Verdict, VerdictKind,
};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A Cartesian axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// All three axes in index order.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Index of this axis into a `[_; 3]` array.
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Axis::X => write!(f, "x"),
            Axis::Y => write!(f, "y"),
            Axis::Z => write!(f, "z"),
        }
    }
}

/// A closed acceptance interval `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    /// Create a range.  The bounds are normalised so that `min <= max`.
    pub fn new(a: f64, b: f64) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// A symmetric range `nominal ± tolerance`.
    pub fn around(nominal: f64, tolerance: f64) -> Self {
        Self::new(nominal - tolerance.abs(), nominal + tolerance.abs())
    }

    /// True when `value` lies inside the range, bounds included.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Signed distance from `value` to the nearest violated bound.
    ///
    /// Negative below `min`, positive above `max`, zero inside.
    pub fn delta(&self, value: f64) -> f64 {
        if value < self.min {
            value - self.min
        } else if value > self.max {
            value - self.max
        } else {
            0.0
        }
    }
}

impl std::fmt::Display for Range {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}
