//! `rigspec-model` – the declared robot.
//!
//! Everything here is built from parameter keys: builders take names of
//! entries in a [`rigspec_params::ParameterSet`] and resolve them, so a
//! model carries no literal dimensions of its own.
//!
//! # Modules
//!
//! - [`part`] – [`PartModel`] and [`PartBuilder`].
//! - [`leg`] – leg kinematics, [`Joint`]s and [`Stance`]s.
//! - [`cable`] – [`CableRun`]s and [`Grommet`]s.
//! - [`assembly`] – [`AssemblyModel`], mates and waypoint resolution.

pub mod assembly;
pub mod cable;
pub mod leg;
pub mod part;

pub use assembly::{AssemblyBuilder, AssemblyModel, Mate};
pub use cable::{CableRun, CableRunBuilder, CableType, Grommet, GrommetBuilder, Waypoint};
pub use leg::{Joint, JointAngles, Leg, LegBuilder, Stance, StanceBuilder};
pub use part::{InterfaceBinding, PartBuilder, PartModel, VolumeAcceptance};
