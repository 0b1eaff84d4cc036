//! Engine options – read from `rigspec.toml` with `RIGSPEC_*` overrides.
//!
//! These are knobs of the validation run itself, not parameters of the
//! robot; the robot lives in the parameter documents.

use std::fs;
use std::path::{Path, PathBuf};

use rigspec_types::ConfigError;
use serde::{Deserialize, Serialize};

/// File name looked up in the working directory by [`load`].
pub const OPTIONS_FILE: &str = "rigspec.toml";

/// Options of one validation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidationOptions {
    /// Evaluate independent checks on the rayon pool.
    #[serde(default = "default_parallel")]
    pub parallel: bool,

    /// Directory receiving STEP/STL artifacts.  When unset, each run
    /// exports into its own temporary directory, removed when the run ends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_dir: Option<PathBuf>,

    /// Reason for waiving a failing total-mass band.  Every use is logged
    /// and recorded in the report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mass_override: Option<String>,
}

fn default_parallel() -> bool {
    true
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            parallel: default_parallel(),
            export_dir: None,
            mass_override: None,
        }
    }
}

impl ValidationOptions {
    /// Sequential evaluation with defaults otherwise.
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            ..Self::default()
        }
    }

    pub fn with_export_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.export_dir = Some(dir.into());
        self
    }

    pub fn with_mass_override(mut self, reason: impl Into<String>) -> Self {
        self.mass_override = Some(reason.into());
        self
    }
}

/// Load `./rigspec.toml`.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<ValidationOptions>, ConfigError> {
    load_from(Path::new(OPTIONS_FILE))
}

/// Load options from `path` and apply environment overrides.
pub fn load_from(path: &Path) -> Result<Option<ValidationOptions>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut options: ValidationOptions = toml::from_str(&raw).map_err(|e| ConfigError::Parse {
        source_name: path.display().to_string(),
        message: e.to_string(),
    })?;
    apply_env_overrides(&mut options);
    Ok(Some(options))
}

/// Apply `RIGSPEC_*` environment variable overrides to `options`.
///
/// | Variable | Field |
/// |---|---|
/// | `RIGSPEC_EXPORT_DIR` | `export_dir` |
/// | `RIGSPEC_PARALLEL` | `parallel` (`true`/`false`/`1`/`0`) |
/// | `RIGSPEC_MASS_OVERRIDE` | `mass_override` (empty clears it) |
pub fn apply_env_overrides(options: &mut ValidationOptions) {
    if let Ok(v) = std::env::var("RIGSPEC_EXPORT_DIR") {
        options.export_dir = Some(PathBuf::from(v));
    }
    if let Ok(v) = std::env::var("RIGSPEC_PARALLEL")
        && let Some(flag) = parse_flag(&v)
    {
        options.parallel = flag;
    }
    if let Ok(v) = std::env::var("RIGSPEC_MASS_OVERRIDE") {
        options.mass_override = if v.trim().is_empty() { None } else { Some(v) };
    }
}

fn parse_flag(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Write options to `path`, creating parent directories.
pub fn save_to(options: &ValidationOptions, path: &Path) -> Result<(), ConfigError> {
    let io = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(io)?;
    }
    let raw = toml::to_string_pretty(options).map_err(|e| ConfigError::Parse {
        source_name: path.display().to_string(),
        message: e.to_string(),
    })?;
    fs::write(path, raw).map_err(io)
}
