//! Error taxonomy.
//!
//! Only configuration and geometry problems are errors.  A violated
//! invariant is never an error: it is recorded as a failing
//! [`Verdict`][crate::Verdict] so the whole defect list reaches the caller.
//!
//! | Error | Propagation |
//! |---|---|
//! | [`ConfigError`] | halts the run before geometry is realized |
//! | [`GeometryError`] | isolated to the part, unless [`GeometryError::is_fatal`] |
//! | [`InterfaceMismatch`] | fails the affected mate's checks only |

use std::path::PathBuf;

use thiserror::Error;

/// Malformed or missing parameter, interface, material or model entries.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),

    #[error("parameter '{key}' is not a {expected}")]
    WrongKind { key: String, expected: &'static str },

    #[error("parameter validation failed: {}", issues.join("; "))]
    Validation { issues: Vec<String> },

    #[error("interface '{name}' is already declared with a different definition")]
    DuplicateInterface { name: String },

    #[error("unknown interface '{0}'")]
    UnknownInterface(String),

    #[error("unknown material '{0}'")]
    UnknownMaterial(String),

    #[error("unknown cable type '{0}'")]
    UnknownCableType(String),

    #[error("unknown actuator '{0}'")]
    UnknownActuator(String),

    #[error("unknown part '{0}'")]
    UnknownPart(String),

    #[error("unknown datum frame '{0}'")]
    UnknownFrame(String),

    #[error("cable run '{run}' references waypoint '{waypoint}' which is neither a grommet nor a component location")]
    DanglingWaypoint { run: String, waypoint: String },

    #[error("failed to parse parameter document '{source_name}': {message}")]
    Parse { source_name: String, message: String },

    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The geometry kernel could not realize, measure or export a shape.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("constraint solve failed for '{part}': {cause}")]
    Unsolvable { part: String, cause: String },

    #[error("degenerate topology in '{part}': {cause}")]
    Degenerate { part: String, cause: String },

    #[error("corrupt geometry in '{part}': {cause}")]
    Corrupt { part: String, cause: String },

    #[error("unknown solid handle {0}")]
    UnknownSolid(u64),

    #[error("export to '{path}' failed: {cause}")]
    Export { path: PathBuf, cause: String },
}

impl GeometryError {
    /// Corrupt geometry poisons the whole run; everything else is isolated
    /// to the part that produced it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, GeometryError::Corrupt { .. })
    }
}

/// Two interfaces bound across a mate are structurally incompatible.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("interface mismatch between '{left}' and '{right}': {reason}")]
pub struct InterfaceMismatch {
    pub left: String,
    pub right: String,
    pub reason: String,
}

/// Errors that abort a validation run.
#[derive(Error, Debug)]
pub enum RigError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),
}
