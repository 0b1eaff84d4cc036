//! `rigspec-params` – the declarative parameter layer.
//!
//! Every dimension, tolerance, material, interface contract, cable type,
//! actuator and design rule of the chassis lives in layered TOML documents.
//! Nothing downstream hardcodes a number: geometry and checks read the
//! resolved [`ParameterSet`].
//!
//! # Modules
//!
//! - [`units`] – recognised units and conversion to canonical units.
//! - [`document`] – the serde model of one parameter document.
//! - [`interface`] – bolt patterns, datum frames, clearance envelopes and
//!   their bind-time compatibility rule.
//! - [`registry`] – [`InterfaceRegistry`], the lookup service for interfaces.
//! - [`rules`] – [`DesignRules`] thresholds with their defaults.
//! - [`store`] – [`ParameterStore`] layering and resolution into an
//!   immutable [`ParameterSet`].

pub mod document;
pub mod interface;
pub mod registry;
pub mod rules;
pub mod store;
pub mod units;

pub use document::ParameterDocument;
pub use interface::{
    BoltPattern, ClearanceEnvelope, Counterbore, DatumFrame, EnvelopeShape, InterfaceKind,
    InterfaceSpec, PatternShape, check_compatible,
};
pub use registry::InterfaceRegistry;
pub use rules::DesignRules;
pub use store::{
    ActuatorSpec, CableTypeSpec, Material, ParamValue, Parameter, ParameterSet, ParameterStore,
};
pub use units::{Dimension, Unit};
