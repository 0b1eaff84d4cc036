//! `rigspec-gate` – the invariant gate.
//!
//! [`InvariantEngine::validate`] realizes every part of an
//! [`rigspec_model::AssemblyModel`] through a
//! [`rigspec_geometry::GeometryKernel`], measures it, and evaluates a fixed
//! battery of [`Check`]s.  The result is a
//! [`rigspec_types::ValidationReport`] listing every verdict, failing or not.
//!
//! # Modules
//!
//! - [`engine`] – [`InvariantEngine`]: realization, battery, override.
//! - [`check`] – the [`Check`] trait and the shared [`CheckContext`].
//! - [`part_checks`] – bounding box, volume, holes, edge distance,
//!   recompute and export.
//! - [`alignment`] – interface compatibility and cross-part alignment.
//! - [`collision`] – part interference and keep-out envelopes.
//! - [`mass`] – [`MassAnalyzer`] and the total-mass band.
//! - [`stability`] – [`SupportPolygon`] and the stability margin.
//! - [`thermal`] – [`ThermalEstimator`] and winding temperature.
//! - [`cable`] – bend radius, clearance, length, current and grommet fill.
//! - [`matching`] – nearest-neighbour hole pairing.
//! - [`config`] – [`ValidationOptions`] from `rigspec.toml` and the
//!   environment.
//! - [`telemetry`] – tracing subscriber and optional OTLP export.

pub mod alignment;
pub mod cable;
pub mod check;
pub mod collision;
pub mod config;
pub mod engine;
pub mod mass;
pub mod matching;
pub mod part_checks;
pub mod stability;
pub mod telemetry;
pub mod thermal;

#[cfg(test)]
pub(crate) mod testkit;

pub use check::{Check, CheckContext, Measurements, PartGeometry, PartState};
pub use config::ValidationOptions;
pub use engine::InvariantEngine;
pub use mass::{MassAnalyzer, MassReport, PartMass};
pub use stability::{Margin, SupportPolygon};
pub use thermal::{JointLoad, ThermalEstimator, efficiency_at};
